use tracing::{debug, info, warn};

use crate::codec::{self, LocationFormat};
use crate::constants::constants;
use crate::grid::{GridError, GridState, StreamEntry, StreamId};
use crate::location::Location;

/// The address bar: one current entry that can be replaced in place.
pub trait History {
  /// Current path plus query, e.g. `/show?streams=…`.
  fn current(&self) -> String;
  /// Replace the current entry without creating a navigable one.
  fn replace(&mut self, location: &str);
}

/// In-memory history used by the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
  current: String,
  replacements: usize,
}

impl MemoryHistory {
  pub fn new(initial: impl Into<String>) -> Self {
    Self { current: initial.into(), replacements: 0 }
  }

  /// How many times the current entry has been replaced.
  pub fn replacements(&self) -> usize {
    self.replacements
  }
}

impl History for MemoryHistory {
  fn current(&self) -> String {
    self.current.clone()
  }

  fn replace(&mut self, location: &str) {
    self.current = location.to_string();
    self.replacements += 1;
  }
}

/// Keeps the grid and the location in step.
///
/// All mutations go through here so each one is fully applied before the
/// location is re-encoded. The base path is captured once at start and
/// prepended to every re-encode.
pub struct LocationSync<H: History> {
  history: H,
  base_path: String,
  grid: GridState,
  format: Option<LocationFormat>,
}

impl<H: History> LocationSync<H> {
  /// Decode the current location, clean up a stray `audio` parameter, then
  /// normalize the location to the current format.
  pub fn start(mut history: H) -> Self {
    let current = history.current();
    let location = match Location::parse(&current) {
      Ok(location) => location,
      Err(e) => {
        warn!(location = %current, err = %e, "sync: unreadable location, starting empty");
        Location::default()
      }
    };
    let decoded = codec::decode(&location);
    info!(
      format = ?decoded.format,
      entries = decoded.grid.len(),
      base_path = %decoded.base_path,
      "sync: location decoded"
    );

    let audio_param = &constants().audio_param;
    if decoded.grid.is_empty() && location.has(audio_param) {
      let mut cleaned = location.clone();
      cleaned.remove(audio_param);
      debug!("sync: removing stray audio parameter");
      history.replace(&cleaned.to_string());
    }

    let mut sync = Self { history, base_path: decoded.base_path, grid: decoded.grid, format: decoded.format };
    sync.sync();
    sync
  }

  pub fn grid(&self) -> &GridState {
    &self.grid
  }

  pub fn base_path(&self) -> &str {
    &self.base_path
  }

  /// Format the startup location was decoded from.
  pub fn decoded_format(&self) -> Option<LocationFormat> {
    self.format
  }

  pub fn history(&self) -> &H {
    &self.history
  }

  pub fn location(&self) -> String {
    self.history.current()
  }

  /// Re-encode the grid; replaces the current entry only if the text differs.
  /// Returns whether the location changed.
  pub fn sync(&mut self) -> bool {
    let current = self.history.current();
    let current_location = Location::parse(&current).unwrap_or_default();
    let target = codec::encode(&self.grid, &self.base_path, &current_location).to_string();
    if target == current {
      return false;
    }
    debug!(from = %current, to = %target, "sync: replacing location");
    self.history.replace(&target);
    true
  }

  pub fn add_stream(&mut self, raw: &str) -> Result<StreamId, GridError> {
    let id = self.grid.add_stream(raw)?;
    self.sync();
    Ok(id)
  }

  pub fn remove_stream(&mut self, id: &StreamId) -> Result<StreamEntry, GridError> {
    let removed = self.grid.remove_stream(id)?;
    self.sync();
    Ok(removed)
  }

  pub fn relabel(&mut self, id: &StreamId, label: impl Into<String>) -> Result<(), GridError> {
    self.grid.relabel(id, label)?;
    self.sync();
    Ok(())
  }

  pub fn set_active_audio(&mut self, id: &StreamId) -> Result<(), GridError> {
    self.grid.set_active_audio(id)?;
    self.sync();
    Ok(())
  }
}
