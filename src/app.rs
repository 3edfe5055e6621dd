use anyhow::{Result, anyhow, bail};
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::codec;
use crate::config::Config;
use crate::constants::constants;
use crate::grid::{GridError, GridState, StreamId};
use crate::input::{Command, HELP};
use crate::location::Location;
use crate::player::{EmbedControl, MuteDispatcher};
use crate::sync::{History, LocationSync};

/// Interactive grid session: the grid, its location and the embeds.
pub struct App<H: History, E: EmbedControl> {
  sync: LocationSync<H>,
  dispatcher: MuteDispatcher,
  embed: E,
  config: Config,
  /// Shown until the next successful action or `dismiss`.
  pub last_error: Option<String>,
  pub should_quit: bool,
}

impl<H: History, E: EmbedControl> App<H, E> {
  pub fn new(history: H, embed: E, config: Config) -> Self {
    let mut app = Self {
      sync: LocationSync::start(history),
      dispatcher: MuteDispatcher::new(),
      embed,
      config,
      last_error: None,
      should_quit: false,
    };
    app.dispatcher.reconcile(app.sync.grid(), &mut app.embed);
    app
  }

  pub fn grid(&self) -> &GridState {
    self.sync.grid()
  }

  pub fn sync(&self) -> &LocationSync<H> {
    &self.sync
  }

  pub fn embed(&self) -> &E {
    &self.embed
  }

  pub fn share_link(&self) -> String {
    self.config.share_link(&self.sync.location())
  }

  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
  }

  fn id_at(&self, position: usize) -> Result<StreamId> {
    match self.grid().entries().get(position.wrapping_sub(1)) {
      Some(entry) => Ok(entry.id.clone()),
      None => bail!("There is no stream {}.", position),
    }
  }

  fn apply(&mut self, command: Command) -> Result<Option<String>> {
    let output = match command {
      Command::Add(raw) => {
        self.sync.add_stream(&raw)?;
        None
      }
      Command::Remove(n) => {
        let id = self.id_at(n)?;
        let removed = self.sync.remove_stream(&id)?;
        Some(format!("Removed {} ({}).", removed.label, removed.video_id))
      }
      Command::Label(n, text) => {
        let id = self.id_at(n)?;
        self.sync.relabel(&id, text)?;
        None
      }
      Command::Audio(n) => {
        let id = self.id_at(n)?;
        self.sync.set_active_audio(&id)?;
        None
      }
      Command::List => Some(self.render_grid()),
      Command::Location => Some(self.share_link()),
      Command::Dismiss => None,
      Command::Help => Some(HELP.to_string()),
      Command::Quit => {
        self.should_quit = true;
        None
      }
    };
    Ok(output)
  }

  /// Apply one command. Returns text to show, if any.
  ///
  /// Failed mutations set `last_error` and leave the grid untouched; a
  /// successful one clears it and reports the new share link.
  pub fn handle_command(&mut self, command: Command) -> Option<String> {
    let before = self.sync.location();
    match self.apply(command) {
      Ok(output) => {
        self.clear_error();
        let issued = self.dispatcher.reconcile(self.sync.grid(), &mut self.embed);
        if issued > 0 {
          debug!(issued, "app: mute instructions sent");
        }
        if self.sync.location() != before {
          let link = self.share_link();
          return Some(match output {
            Some(text) => format!("{}\n{}", text, link),
            None => link,
          });
        }
        output
      }
      Err(e) => {
        info!(err = %e, "app: action rejected");
        self.set_error(e.to_string());
        None
      }
    }
  }

  /// Numbered grid listing; `*` marks the stream with audio.
  pub fn render_grid(&self) -> String {
    let grid = self.grid();
    if grid.is_empty() {
      return "No streams added.".to_string();
    }
    let mut out = String::new();
    for (i, entry) in grid.entries().iter().enumerate() {
      let marker = if grid.is_audio_active(&entry.id) { '*' } else { ' ' };
      let _ = writeln!(out, "{} {:>2}. {:<24} {}", marker, i + 1, entry.label, entry.video_id);
    }
    let _ = write!(out, "{} active", grid.len());
    out
  }
}

/// How `share` should pick the audible stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAudio {
  /// First stream, as when adding streams by hand.
  Default,
  /// 1-based position.
  Stream(usize),
  Muted,
}

/// Build a share location from links, optional `(position, label)` pairs and an audio choice.
pub fn share_location(
  links: &[String],
  labels: &[(usize, String)],
  audio: ShareAudio,
  base_path: &str,
  compressed: bool,
) -> Result<Location> {
  let mut grid = GridState::new();
  let mut ids = Vec::with_capacity(links.len());
  for link in links {
    match grid.add_stream(link) {
      Ok(id) => ids.push(id),
      Err(GridError::DuplicateStream { video_id }) => bail!("{} is listed twice.", video_id),
      Err(e) => bail!("{}: {}", link, e),
    }
  }
  let lookup = |n: usize| ids.get(n.wrapping_sub(1)).cloned().ok_or_else(|| anyhow!("There is no stream {}.", n));

  for (n, label) in labels {
    grid.relabel(&lookup(*n)?, label.clone())?;
  }
  match audio {
    ShareAudio::Default => {}
    ShareAudio::Stream(n) => {
      let id = lookup(n)?;
      if !grid.is_audio_active(&id) {
        grid.set_active_audio(&id)?;
      }
    }
    ShareAudio::Muted => {
      if let Some(id) = grid.active_audio().cloned() {
        grid.set_active_audio(&id)?;
      }
    }
  }

  let base = Location { path: base_path.to_string(), query: Vec::new() };
  if compressed {
    let mut location = base;
    if let Some(payload) = codec::compress_state(&grid) {
      location.set(&constants().compressed_param, payload);
    }
    return Ok(location);
  }
  Ok(codec::encode(&grid, base_path, &base))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::MemoryHistory;

  #[derive(Default)]
  struct RecordingEmbed {
    calls: Vec<(String, bool)>,
  }

  impl EmbedControl for RecordingEmbed {
    fn set_muted(&mut self, video_id: &str, muted: bool) {
      self.calls.push((video_id.to_string(), muted));
    }
  }

  fn app(location: &str) -> App<MemoryHistory, RecordingEmbed> {
    App::new(MemoryHistory::new(location), RecordingEmbed::default(), Config::default())
  }

  // --- session ---

  #[test]
  fn startup_unmutes_decoded_audio_entry() {
    let app = app("/?streams=aaaaaaaaaaa/bbbbbbbbbbb&audio=bbbbbbbbbbb");
    assert_eq!(app.embed().calls, [("aaaaaaaaaaa".to_string(), true), ("bbbbbbbbbbb".to_string(), false)]);
  }

  #[test]
  fn add_reports_new_location() {
    let mut app = app("/");
    let out = app.handle_command(Command::Add("https://youtu.be/aaaaaaaaaaa".to_string()));
    assert_eq!(out.as_deref(), Some("/?streams=aaaaaaaaaaa%7EStream%25201&audio=aaaaaaaaaaa"));
    assert_eq!(app.embed().calls, [("aaaaaaaaaaa".to_string(), false)]);
  }

  #[test]
  fn errors_persist_until_success_or_dismiss() {
    let mut app = app("/");
    app.handle_command(Command::Add("https://youtu.be/aaaaaaaaaaa".to_string()));
    let out = app.handle_command(Command::Add("https://youtu.be/aaaaaaaaaaa".to_string()));
    assert_eq!(out, None);
    assert_eq!(app.last_error.as_deref(), Some("This stream is already in the grid."));

    app.handle_command(Command::Add("garbage".to_string()));
    assert_eq!(app.last_error.as_deref(), Some("Invalid YouTube URL. Please enter a valid link."));

    app.handle_command(Command::Dismiss);
    assert_eq!(app.last_error, None);

    app.handle_command(Command::Remove(5));
    assert_eq!(app.last_error.as_deref(), Some("There is no stream 5."));
    let before = app.sync().location();
    app.handle_command(Command::Label(2, "x".to_string()));
    assert_eq!(app.last_error.as_deref(), Some("There is no stream 2."));
    app.handle_command(Command::Audio(0));
    assert_eq!(app.last_error.as_deref(), Some("There is no stream 0."));
    assert_eq!(app.sync().location(), before);
    app.handle_command(Command::List);
    assert_eq!(app.last_error, None);
  }

  #[test]
  fn audio_toggle_and_removal() {
    let mut app = app("/");
    app.handle_command(Command::Add("https://youtu.be/aaaaaaaaaaa".to_string()));
    app.handle_command(Command::Add("https://youtu.be/bbbbbbbbbbb".to_string()));
    app.handle_command(Command::Audio(2));
    assert_eq!(app.grid().active_entry().map(|e| e.video_id.as_str()), Some("bbbbbbbbbbb"));
    let out = app.handle_command(Command::Remove(2)).unwrap();
    assert!(out.starts_with("Removed Stream 2 (bbbbbbbbbbb)."));
    assert_eq!(app.grid().active_audio(), None);
    assert!(!app.share_link().contains("audio="));
  }

  #[test]
  fn render_marks_audible_stream() {
    let mut app = app("/");
    app.handle_command(Command::Add("https://youtu.be/aaaaaaaaaaa".to_string()));
    app.handle_command(Command::Label(1, "Cam".to_string()));
    let listing = app.render_grid();
    assert!(listing.starts_with("*  1. Cam"));
    assert!(listing.ends_with("1 active"));
  }

  #[test]
  fn quit_sets_flag() {
    let mut app = app("/");
    app.handle_command(Command::Quit);
    assert!(app.should_quit);
  }

  // --- share_location ---

  fn links() -> Vec<String> {
    vec!["https://youtu.be/aaaaaaaaaaa".to_string(), "https://www.youtube.com/watch?v=bbbbbbbbbbb".to_string()]
  }

  #[test]
  fn share_defaults_to_first_stream_audible() {
    let location = share_location(&links(), &[], ShareAudio::Default, "/", false).unwrap();
    assert_eq!(location.get("streams"), Some("aaaaaaaaaaa~Stream%201/bbbbbbbbbbb~Stream%202"));
    assert_eq!(location.get("audio"), Some("aaaaaaaaaaa"));
  }

  #[test]
  fn share_with_labels_audio_and_base() {
    let labels = vec![(2, "Main stage".to_string())];
    let location = share_location(&links(), &labels, ShareAudio::Stream(2), "/show", false).unwrap();
    assert_eq!(location.path, "/show");
    assert_eq!(location.get("streams"), Some("aaaaaaaaaaa~Stream%201/bbbbbbbbbbb~Main%20stage"));
    assert_eq!(location.get("audio"), Some("bbbbbbbbbbb"));

    let first = share_location(&links(), &[], ShareAudio::Stream(1), "/", false).unwrap();
    assert_eq!(first.get("audio"), Some("aaaaaaaaaaa"));
  }

  #[test]
  fn share_muted_has_no_audio() {
    let location = share_location(&links(), &[], ShareAudio::Muted, "/", false).unwrap();
    assert!(!location.has("audio"));
  }

  #[test]
  fn share_compressed_decodes_back() {
    let location = share_location(&links(), &[], ShareAudio::Stream(2), "/", true).unwrap();
    assert!(!location.has("streams"));
    let decoded = codec::decode(&Location::parse(&location.to_string()).unwrap());
    assert_eq!(decoded.grid.len(), 2);
    assert_eq!(decoded.grid.active_entry().map(|e| e.video_id.as_str()), Some("bbbbbbbbbbb"));
  }

  #[test]
  fn share_rejects_bad_input() {
    let mut dup = links();
    dup.push("https://youtu.be/aaaaaaaaaaa".to_string());
    assert!(share_location(&dup, &[], ShareAudio::Default, "/", false).is_err());
    assert!(share_location(&["nope".to_string()], &[], ShareAudio::Default, "/", false).is_err());
    assert!(share_location(&links(), &[(3, "x".to_string())], ShareAudio::Default, "/", false).is_err());
    assert!(share_location(&links(), &[], ShareAudio::Stream(0), "/", false).is_err());
  }
}
