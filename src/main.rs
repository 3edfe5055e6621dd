use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use multistream_grid::app::{App, ShareAudio, share_location};
use multistream_grid::codec::{self, LocationFormat};
use multistream_grid::config::Config;
use multistream_grid::grid::GridState;
use multistream_grid::input::parse_command;
use multistream_grid::location::Location;
use multistream_grid::player::LoggingEmbed;
use multistream_grid::sync::{LocationSync, MemoryHistory};
use multistream_grid::youtube::embed_url;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Log at debug level (RUST_LOG takes precedence)
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Origin prepended to printed locations, e.g. https://grid.example
  #[arg(long, global = true)]
  origin: Option<String>,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Show the grid a location describes
  Decode {
    location: String,
    /// Print JSON instead of a listing
    #[arg(long)]
    json: bool,
  },
  /// Rewrite a location in the current format
  Encode { location: String },
  /// Build a share location from links
  Share {
    #[arg(required = true)]
    links: Vec<String>,
    /// Label a stream, e.g. --label 2="Main stage"
    #[arg(short, long = "label", value_parser = parse_label)]
    labels: Vec<(usize, String)>,
    /// Stream number that gets the audio (default: the first)
    #[arg(short, long, conflicts_with = "muted")]
    audio: Option<usize>,
    /// Share with every stream muted
    #[arg(long)]
    muted: bool,
    /// Base path kept in front of the query
    #[arg(long, default_value = "/")]
    base: String,
    /// Emit the compressed `s` format
    #[arg(long)]
    compressed: bool,
  },
  /// Edit a grid interactively, starting from an optional location
  Session { location: Option<String> },
  /// Show or update saved preferences
  Config {
    #[arg(long)]
    set_origin: Option<String>,
    #[arg(long)]
    set_log_file: Option<PathBuf>,
  },
  /// Print shell completions
  Completions { shell: clap_complete::Shell },
}

fn parse_label(raw: &str) -> Result<(usize, String), String> {
  let (n, label) = raw.split_once('=').ok_or_else(|| format!("expected N=TEXT, got '{}'", raw))?;
  let n = n.trim().parse().map_err(|_| format!("'{}' is not a stream number", n))?;
  Ok((n, label.to_string()))
}

// --- Logging ---

/// Stderr by default, or a non-blocking file writer when `log_file` is set.
/// The guard must live until exit so buffered lines are flushed.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let default = if verbose { "debug" } else { "warn,multistream_grid::player=info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  if let Some(path) = log_file {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name().context("log_file has no file name")?;
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
    return Ok(Some(guard));
  }

  tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
  Ok(None)
}

// --- Commands ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecodeReport<'a> {
  format: Option<LocationFormat>,
  base_path: &'a str,
  grid: &'a GridState,
  /// Widget source per entry, in grid order.
  embeds: Vec<String>,
}

fn run_decode(input: &str, json: bool, config: &Config) -> Result<()> {
  let location = Location::parse(input).with_context(|| format!("'{}' is not a location", input))?;
  let decoded = codec::decode(&location);
  if json {
    let origin = config.origin.as_deref().unwrap_or_default();
    let embeds = decoded.grid.entries().iter().map(|e| embed_url(&e.video_id, origin)).collect();
    let report = DecodeReport { format: decoded.format, base_path: &decoded.base_path, grid: &decoded.grid, embeds };
    println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize grid")?);
    return Ok(());
  }
  match decoded.format {
    Some(format) => println!("format:    {}", format),
    None => println!("format:    none"),
  }
  println!("base path: {}", decoded.base_path);
  for (i, entry) in decoded.grid.entries().iter().enumerate() {
    let marker = if decoded.grid.is_audio_active(&entry.id) { '*' } else { ' ' };
    println!("{} {:>2}. {:<24} {}", marker, i + 1, entry.label, entry.video_id);
  }
  Ok(())
}

fn run_encode(input: &str, config: &Config) -> Result<()> {
  Location::parse(input).with_context(|| format!("'{}' is not a location", input))?;
  let sync = LocationSync::start(MemoryHistory::new(input.trim()));
  println!("{}", config.share_link(&sync.location()));
  Ok(())
}

fn run_config(set_origin: Option<String>, set_log_file: Option<PathBuf>) -> Result<()> {
  let mut config = Config::load();
  if set_origin.is_none() && set_log_file.is_none() {
    if let Some(path) = Config::path() {
      println!("# {}", path.display());
    }
    print!("{}", toml::to_string(&config).context("Failed to serialize config")?);
    return Ok(());
  }
  if let Some(origin) = set_origin {
    config.origin = Some(origin).filter(|o| !o.is_empty());
  }
  if let Some(log_file) = set_log_file {
    config.log_file = Some(log_file).filter(|p| !p.as_os_str().is_empty());
  }
  let path = config.save()?;
  println!("Saved {}", path.display());
  Ok(())
}

async fn run_session(initial: Option<String>, config: Config) -> Result<()> {
  let initial = initial.map(|l| l.trim().to_string()).unwrap_or_else(|| "/".to_string());
  let mut app = App::new(MemoryHistory::new(initial), LoggingEmbed, config);
  info!(format = ?app.sync().decoded_format(), entries = app.grid().len(), "session: started");

  println!("{}", app.render_grid());
  println!("{}", app.share_link());
  println!("Type 'help' for commands.");

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    match &app.last_error {
      Some(err) => print!("[! {}] > ", err),
      None => print!("> "),
    }
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let Some(line) = lines.next_line().await.context("Failed to read stdin")? else { break };
    let command = match parse_command(&line) {
      Ok(Some(command)) => command,
      Ok(None) => continue,
      Err(e) => {
        app.set_error(format!("{:#}", e));
        continue;
      }
    };
    if let Some(output) = app.handle_command(command) {
      println!("{}", output);
    }
    if app.should_quit {
      break;
    }
  }
  Ok(())
}

// --- Main ---

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let args = Args::parse();
  let mut config = Config::load();
  if let Some(origin) = args.origin {
    config.origin = Some(origin);
  }
  let _guard = init_tracing(args.verbose, config.log_file.as_deref())?;

  match args.command {
    Cmd::Decode { location, json } => run_decode(&location, json, &config)?,
    Cmd::Encode { location } => run_encode(&location, &config)?,
    Cmd::Share { links, labels, audio, muted, base, compressed } => {
      let audio = match (audio, muted) {
        (_, true) => ShareAudio::Muted,
        (Some(n), false) => ShareAudio::Stream(n),
        (None, false) => ShareAudio::Default,
      };
      let base = format!("/{}", base.trim_matches('/'));
      let location = share_location(&links, &labels, audio, &base, compressed)?;
      println!("{}", config.share_link(&location.to_string()));
    }
    Cmd::Session { location } => run_session(location, config).await?,
    Cmd::Config { set_origin, set_log_file } => run_config(set_origin, set_log_file)?,
    Cmd::Completions { shell } => {
      clap_complete::generate(shell, &mut Args::command(), "multistream", &mut std::io::stdout());
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_and_encode_reject_unparseable_locations() {
    let config = Config::default();
    assert!(run_decode("http://[broken", false, &config).is_err());
    assert!(run_encode("http://[broken", &config).is_err());
  }

  #[test]
  fn encode_accepts_legacy_location() {
    assert!(run_encode("/show/aaaaaaaaaaa", &Config::default()).is_ok());
  }
}
