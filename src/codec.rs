//! Grid state ⇄ location codec.
//!
//! Only the slash-delimited `streams` format is ever written. Decoding accepts
//! four historical formats, tried in a fixed order; the first one whose
//! candidates hydrate to at least one entry wins and later formats are never
//! consulted. A broken location degrades to an empty grid, never an error.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::constants::constants;
use crate::grid::{EncodedStream, GridState};
use crate::location::Location;
use crate::youtube::is_id_char;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'!')
  .remove(b'~')
  .remove(b'*')
  .remove(b'\'')
  .remove(b'(')
  .remove(b')');

/// The wire format a grid was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationFormat {
  /// Trailing identifier segments in the path.
  PathSegments,
  /// `?streams=id~label/id~label`
  StreamsParam,
  /// `?s=<lz-string payload>`
  Compressed,
  /// `?streams=[{"videoId":..,"label":..}]`
  LegacyJson,
}

impl fmt::Display for LocationFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      LocationFormat::PathSegments => "path-segments",
      LocationFormat::StreamsParam => "streams",
      LocationFormat::Compressed => "compressed",
      LocationFormat::LegacyJson => "legacy-json",
    })
  }
}

/// Candidates read from one format, before hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedStreams {
  pub streams: Vec<EncodedStream>,
  pub active_video_id: Option<String>,
}

/// Outcome of trying one format against a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeAttempt {
  Entries(DecodedStreams),
  /// The format is absent or carries nothing.
  Empty,
  /// The format is present but could not be read.
  Malformed(String),
}

type Strategy = fn(&Location) -> DecodeAttempt;

/// Decode precedence.
const STRATEGIES: [(LocationFormat, Strategy); 4] = [
  (LocationFormat::PathSegments, decode_path_segments),
  (LocationFormat::StreamsParam, decode_streams_param),
  (LocationFormat::Compressed, decode_compressed),
  (LocationFormat::LegacyJson, decode_legacy_json),
];

/// Result of decoding a whole location.
#[derive(Debug, Clone)]
pub struct Decoded {
  pub grid: GridState,
  /// Path prefix every re-encode must keep.
  pub base_path: String,
  /// `None` when no format produced entries.
  pub format: Option<LocationFormat>,
}

// --- Labels ---

pub fn encode_label(label: &str) -> String {
  utf8_percent_encode(label, URI_COMPONENT).to_string()
}

/// Percent-decode a label; invalid UTF-8 decodes lossily.
pub fn decode_label(encoded: &str) -> String {
  percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

// --- Path segments ---

fn is_path_identifier(segment: &str) -> bool {
  segment.len() >= constants().min_path_segment_len && segment.chars().all(is_id_char)
}

/// Split a path into its base path and the trailing run of identifier segments.
///
/// `/myapp/show/abcdefghijk` → (`/myapp/show`, [`abcdefghijk`]). The base path
/// is `/` when every segment is consumed.
pub fn split_path(path: &str) -> (String, Vec<String>) {
  let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
  let run = segments.iter().rev().take_while(|s| is_path_identifier(s)).count();
  let (base, ids) = segments.split_at(segments.len() - run);
  (format!("/{}", base.join("/")), ids.iter().map(|s| s.to_string()).collect())
}

/// Base path with every segment kept, used when the path carried no streams.
fn full_path(path: &str) -> String {
  let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
  format!("/{}", segments.join("/"))
}

fn audio_param(location: &Location) -> Option<String> {
  location.get(&constants().audio_param).filter(|v| !v.is_empty()).map(str::to_string)
}

pub fn decode_path_segments(location: &Location) -> DecodeAttempt {
  let (_, ids) = split_path(&location.path);
  if ids.is_empty() {
    return DecodeAttempt::Empty;
  }
  DecodeAttempt::Entries(DecodedStreams {
    streams: ids.into_iter().map(|id| EncodedStream::new(id, None)).collect(),
    active_video_id: audio_param(location),
  })
}

// --- Slash-delimited streams ---

/// Parse `id[~label]/id[~label]/…`. Empty tokens and empty ids are dropped.
pub fn parse_streams_value(value: &str) -> Vec<EncodedStream> {
  value
    .split('/')
    .filter(|token| !token.is_empty())
    .filter_map(|token| {
      let (video_id, label) = match token.split_once('~') {
        Some((id, label)) => (id, Some(label).filter(|l| !l.is_empty()).map(decode_label)),
        None => (token, None),
      };
      (!video_id.is_empty()).then(|| EncodedStream::new(video_id, label))
    })
    .collect()
}

pub fn decode_streams_param(location: &Location) -> DecodeAttempt {
  let Some(value) = location.get(&constants().streams_param) else {
    return DecodeAttempt::Empty;
  };
  let streams = parse_streams_value(value);
  if streams.is_empty() {
    return DecodeAttempt::Empty;
  }
  DecodeAttempt::Entries(DecodedStreams { streams, active_video_id: audio_param(location) })
}

// --- Compressed ---

#[derive(Debug, Serialize)]
struct CompressedStream {
  v: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  l: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompressedState {
  s: Vec<CompressedStream>,
  #[serde(skip_serializing_if = "Option::is_none")]
  a: Option<String>,
}

/// Read side of [`CompressedState`]. Items stay loose so one bad entry only
/// drops itself.
#[derive(Debug, Deserialize)]
struct CompressedPayload {
  s: Vec<Value>,
  /// Anything but a string is treated as absent.
  #[serde(default)]
  a: Option<Value>,
}

/// One candidate from a JSON item, or `None` when `id_key` is not a non-empty string.
fn stream_from_json(item: &Value, id_key: &str, label_key: &str) -> Option<EncodedStream> {
  let video_id = item.get(id_key).and_then(Value::as_str).filter(|v| !v.is_empty())?;
  let label = item.get(label_key).and_then(Value::as_str).map(str::to_string);
  Some(EncodedStream::new(video_id, label))
}

pub fn decode_compressed(location: &Location) -> DecodeAttempt {
  let Some(value) = location.get(&constants().compressed_param).filter(|v| !v.is_empty()) else {
    return DecodeAttempt::Empty;
  };
  // Form decoding turns the payload's `+` into spaces.
  let restored = value.replace(' ', "+");
  let Some(wide) = lz_str::decompress_from_encoded_uri_component(restored.as_str()) else {
    return DecodeAttempt::Malformed("payload does not decompress".to_string());
  };
  let json = match String::from_utf16(&wide) {
    Ok(json) if !json.is_empty() => json,
    Ok(_) => return DecodeAttempt::Malformed("payload decompresses to nothing".to_string()),
    Err(e) => return DecodeAttempt::Malformed(format!("payload is not UTF-16: {}", e)),
  };
  let payload: CompressedPayload = match serde_json::from_str(&json) {
    Ok(payload) => payload,
    Err(e) => return DecodeAttempt::Malformed(format!("payload is not a grid state: {}", e)),
  };
  let streams: Vec<EncodedStream> = payload.s.iter().filter_map(|item| stream_from_json(item, "v", "l")).collect();
  if streams.is_empty() {
    return DecodeAttempt::Empty;
  }
  let active_video_id = payload.a.as_ref().and_then(Value::as_str).map(str::to_string);
  DecodeAttempt::Entries(DecodedStreams { streams, active_video_id })
}

/// Compressed (`s`) payload for `grid`, or `None` for an empty grid.
pub fn compress_state(grid: &GridState) -> Option<String> {
  if grid.is_empty() {
    return None;
  }
  let state = CompressedState {
    s: grid
      .entries()
      .iter()
      .map(|e| CompressedStream { v: e.video_id.clone(), l: Some(e.label.clone()).filter(|l| !l.is_empty()) })
      .collect(),
    a: grid.active_entry().map(|e| e.video_id.clone()),
  };
  let json = serde_json::to_string(&state).ok()?;
  Some(lz_str::compress_to_encoded_uri_component(json.as_str()))
}

// --- Legacy JSON ---

pub fn decode_legacy_json(location: &Location) -> DecodeAttempt {
  let Some(value) = location.get(&constants().streams_param).filter(|v| !v.is_empty()) else {
    return DecodeAttempt::Empty;
  };
  let items: Vec<Value> = match serde_json::from_str(value) {
    Ok(items) => items,
    Err(e) => return DecodeAttempt::Malformed(format!("streams is not a JSON array: {}", e)),
  };
  let streams: Vec<EncodedStream> =
    items.iter().filter_map(|item| stream_from_json(item, "videoId", "label")).collect();
  if streams.is_empty() {
    return DecodeAttempt::Empty;
  }
  DecodeAttempt::Entries(DecodedStreams { streams, active_video_id: audio_param(location) })
}

// --- Decode / encode ---

/// Decode a location into a grid, trying each format in precedence order.
pub fn decode(location: &Location) -> Decoded {
  for (format, strategy) in STRATEGIES {
    match strategy(location) {
      DecodeAttempt::Entries(decoded) => {
        let grid = GridState::hydrate(decoded.streams, decoded.active_video_id.as_deref());
        if grid.is_empty() {
          debug!(%format, "codec: no valid entries, trying next format");
          continue;
        }
        let base_path = match format {
          LocationFormat::PathSegments => split_path(&location.path).0,
          _ => full_path(&location.path),
        };
        debug!(%format, entries = grid.len(), base_path = %base_path, "codec: location decoded");
        return Decoded { grid, base_path, format: Some(format) };
      }
      DecodeAttempt::Empty => {}
      DecodeAttempt::Malformed(reason) => {
        debug!(%format, reason = %reason, "codec: malformed location data ignored");
      }
    }
  }
  Decoded { grid: GridState::new(), base_path: full_path(&location.path), format: None }
}

/// The `streams` value for `grid`, or `None` when the grid is empty.
///
/// Every non-empty label is written, defaults included.
pub fn encode_streams(grid: &GridState) -> Option<String> {
  if grid.is_empty() {
    return None;
  }
  let tokens: Vec<String> = grid
    .entries()
    .iter()
    .map(|e| if e.label.is_empty() { e.video_id.clone() } else { format!("{}~{}", e.video_id, encode_label(&e.label)) })
    .collect();
  Some(tokens.join("/"))
}

/// Target location for `grid`: `base_path`, the unrelated query pairs of
/// `current`, then `streams` and `audio`.
pub fn encode(grid: &GridState, base_path: &str, current: &Location) -> Location {
  let c = constants();
  let mut next = Location { path: base_path.to_string(), query: current.query.clone() };
  next.remove(&c.compressed_param);
  next.remove(&c.streams_param);
  next.remove(&c.audio_param);
  if let Some(streams) = encode_streams(grid) {
    next.set(&c.streams_param, streams);
    if let Some(active) = grid.active_entry() {
      next.set(&c.audio_param, active.video_id.clone());
    }
  }
  next
}
