use chrono::Utc;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::constants::constants;
use crate::youtube::{extract_video_id, is_valid_video_id, watch_url};

/// Session-local identity of a grid entry. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
  fn generate() -> Self {
    Self(Uuid::new_v4().simple().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for StreamId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// User-visible failures of a grid mutation. None of them mutate the grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
  #[error("Invalid YouTube URL. Please enter a valid link.")]
  InvalidLink,
  #[error("This stream is already in the grid.")]
  DuplicateStream { video_id: String },
  #[error("No stream with id {0} in the grid.")]
  UnknownStream(StreamId),
}

/// One cell of the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
  pub id: StreamId,
  pub video_id: String,
  /// Text the user pasted; canonical watch URL for hydrated entries.
  pub source_url: String,
  /// Milliseconds; only meaningful as a creation-order tiebreaker.
  pub added_at: i64,
  pub label: String,
}

/// Default label for the entry at `position` (0-based).
pub fn default_label(position: usize) -> String {
  format!("{} {}", constants().default_label_prefix, position + 1)
}

/// Candidate entry produced by the location codec, before hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedStream {
  pub video_id: String,
  pub label: Option<String>,
}

impl EncodedStream {
  pub fn new(video_id: impl Into<String>, label: Option<String>) -> Self {
    Self { video_id: video_id.into(), label }
  }
}

/// Ordered streams plus the single entry allowed to play audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
  entries: Vec<StreamEntry>,
  active_audio: Option<StreamId>,
}

impl GridState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a grid from decoded candidates.
  ///
  /// Ids are fresh and `added_at` strictly increases in decode order. Invalid
  /// identifiers and repeated video ids are skipped; missing or empty labels
  /// get the default for their final grid position. `active_video_id` is
  /// honored only if it names a hydrated entry.
  pub fn hydrate(streams: Vec<EncodedStream>, active_video_id: Option<&str>) -> Self {
    let now = Utc::now().timestamp_millis();
    let mut grid = Self::new();
    for stream in streams {
      if !is_valid_video_id(&stream.video_id) {
        debug!(video_id = %stream.video_id, "grid: skipping invalid identifier during hydration");
        continue;
      }
      if grid.contains_video(&stream.video_id) {
        debug!(video_id = %stream.video_id, "grid: skipping duplicate during hydration");
        continue;
      }
      let position = grid.entries.len();
      let label = stream.label.filter(|l| !l.is_empty()).unwrap_or_else(|| default_label(position));
      grid.entries.push(StreamEntry {
        id: StreamId::generate(),
        source_url: watch_url(&stream.video_id),
        video_id: stream.video_id,
        added_at: now + position as i64,
        label,
      });
    }
    if let Some(video_id) = active_video_id {
      grid.active_audio = grid.find_by_video(video_id).map(|e| e.id.clone());
      if grid.active_audio.is_none() {
        debug!(video_id, "grid: active audio does not match any entry, ignoring");
      }
    }
    grid
  }

  pub fn entries(&self) -> &[StreamEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, id: &StreamId) -> Option<&StreamEntry> {
    self.entries.iter().find(|e| &e.id == id)
  }

  pub fn contains_video(&self, video_id: &str) -> bool {
    self.find_by_video(video_id).is_some()
  }

  pub fn find_by_video(&self, video_id: &str) -> Option<&StreamEntry> {
    self.entries.iter().find(|e| e.video_id == video_id)
  }

  pub fn active_audio(&self) -> Option<&StreamId> {
    self.active_audio.as_ref()
  }

  /// The entry currently allowed to play audio, if the pointer resolves.
  pub fn active_entry(&self) -> Option<&StreamEntry> {
    self.active_audio.as_ref().and_then(|id| self.get(id))
  }

  pub fn is_audio_active(&self, id: &StreamId) -> bool {
    self.active_audio.as_ref() == Some(id)
  }

  /// Append a stream from pasted link text.
  ///
  /// The first stream added to an empty grid becomes audible.
  pub fn add_stream(&mut self, raw: &str) -> Result<StreamId, GridError> {
    let video_id = extract_video_id(raw).ok_or(GridError::InvalidLink)?;
    if self.contains_video(&video_id) {
      return Err(GridError::DuplicateStream { video_id });
    }
    let id = StreamId::generate();
    let position = self.entries.len();
    info!(video_id = %video_id, position, "grid: stream added");
    self.entries.push(StreamEntry {
      id: id.clone(),
      label: default_label(position),
      video_id,
      source_url: raw.to_string(),
      added_at: Utc::now().timestamp_millis(),
    });
    if position == 0 {
      self.active_audio = Some(id.clone());
    }
    Ok(id)
  }

  /// Remove an entry. Removing the audible entry mutes everything; no other entry takes over.
  pub fn remove_stream(&mut self, id: &StreamId) -> Result<StreamEntry, GridError> {
    let index = self.position(id)?;
    let removed = self.entries.remove(index);
    if self.active_audio.as_ref() == Some(id) {
      self.active_audio = None;
    }
    info!(video_id = %removed.video_id, "grid: stream removed");
    Ok(removed)
  }

  pub fn relabel(&mut self, id: &StreamId, label: impl Into<String>) -> Result<(), GridError> {
    let index = self.position(id)?;
    self.entries[index].label = label.into();
    Ok(())
  }

  /// Give `id` the audio, or mute everything if it already has it.
  pub fn set_active_audio(&mut self, id: &StreamId) -> Result<(), GridError> {
    self.position(id)?;
    if self.active_audio.as_ref() == Some(id) {
      debug!(id = %id, "grid: audio toggled off");
      self.active_audio = None;
    } else {
      debug!(id = %id, "grid: audio moved");
      self.active_audio = Some(id.clone());
    }
    Ok(())
  }

  fn position(&self, id: &StreamId) -> Result<usize, GridError> {
    self.entries.iter().position(|e| &e.id == id).ok_or_else(|| GridError::UnknownStream(id.clone()))
  }
}
