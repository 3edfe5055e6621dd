use std::collections::HashMap;
use tracing::info;

use crate::grid::{GridState, StreamId};

/// Command channel of one embedded player per grid entry.
///
/// Instructions may arrive before the widget reports ready; buffering or
/// retrying them is the widget's concern.
pub trait EmbedControl {
  fn set_muted(&mut self, video_id: &str, muted: bool);
}

/// Embed that only records instructions in the log.
#[derive(Debug, Default)]
pub struct LoggingEmbed;

impl EmbedControl for LoggingEmbed {
  fn set_muted(&mut self, video_id: &str, muted: bool) {
    info!(video_id, muted, "player: {}", if muted { "mute" } else { "unMute" });
  }
}

/// Sends mute/unmute only when an entry's muted flag changes.
#[derive(Debug, Default)]
pub struct MuteDispatcher {
  sent: HashMap<StreamId, bool>,
}

impl MuteDispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bring every embed in line with `grid`. A newly seen entry always gets
  /// its current state; entries no longer in the grid are forgotten.
  /// Returns how many instructions were sent.
  pub fn reconcile(&mut self, grid: &GridState, embed: &mut impl EmbedControl) -> usize {
    self.sent.retain(|id, _| grid.get(id).is_some());
    let mut issued = 0;
    for entry in grid.entries() {
      let muted = !grid.is_audio_active(&entry.id);
      if self.sent.get(&entry.id) != Some(&muted) {
        embed.set_muted(&entry.video_id, muted);
        self.sent.insert(entry.id.clone(), muted);
        issued += 1;
      }
    }
    issued
  }
}
