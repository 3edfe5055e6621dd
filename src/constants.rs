//! Parameter names, identifier rules and platform URLs, read from the
//! embedded `constants.ron` on first access.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable codec constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Location parameters
  pub streams_param: String,
  pub compressed_param: String,
  pub audio_param: String,

  // Identifiers
  pub video_id_len: usize,
  pub min_path_segment_len: usize,

  // Labels
  pub default_label_prefix: String,

  // Platform URLs
  pub watch_url_base: String,
  pub embed_url_base: String,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  ron::from_str(include_str!("../constants.ron")).expect("embedded constants.ron is valid RON")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
