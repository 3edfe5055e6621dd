use regex::Regex;
use std::sync::LazyLock;

use crate::constants::constants;

/// Known link shapes. The greedy prefix makes the last marker in the text win,
/// and the candidate runs until the first `#`, `&` or `?`.
static LINK_SHAPES: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^.*(youtu\.be/|live/|shorts/|v/|u/[A-Za-z0-9_]/|embed/|watch\?v=|&v=)([^#&?]*).*")
    .expect("link shape pattern is a valid regex")
});

/// Whether `c` belongs to the identifier alphabet (letters, digits, `-`, `_`).
pub fn is_id_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// A canonical video identifier: exactly `video_id_len` identifier-alphabet characters.
pub fn is_valid_video_id(candidate: &str) -> bool {
  candidate.len() == constants().video_id_len && candidate.chars().all(is_id_char)
}

/// Extract the canonical video identifier from pasted link text.
///
/// Recognizes short links (`youtu.be/`), `live/`, `shorts/`, `v/`, user-channel
/// `u/<c>/`, `embed/`, `watch?v=` and `&v=`. Returns `None` when no shape
/// matches or the captured candidate is not a valid identifier. There is no
/// existence check; an unplayable id is only discovered by the embed.
pub fn extract_video_id(text: &str) -> Option<String> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return None;
  }
  let caps = LINK_SHAPES.captures(trimmed)?;
  let candidate = caps.get(2)?.as_str();
  is_valid_video_id(candidate).then(|| candidate.to_string())
}

/// Canonical watch URL, used as the source URL of hydrated entries.
pub fn watch_url(video_id: &str) -> String {
  format!("{}{}", constants().watch_url_base, video_id)
}

/// Source URL for the embed widget of one grid cell.
///
/// The widget starts muted and autoplaying; `enablejsapi` and `origin` are
/// required for the mute/unmute command channel to be accepted.
pub fn embed_url(video_id: &str, origin: &str) -> String {
  format!(
    "{}{}?autoplay=1&mute=1&controls=1&playsinline=1&rel=0&enablejsapi=1&origin={}",
    constants().embed_url_base,
    video_id,
    origin
  )
}
