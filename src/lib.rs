//! Multi-stream viewing grid: which streams are shown, their labels and which
//! one has audio, kept in a shareable location string.

pub mod app;
pub mod codec;
pub mod config;
pub mod constants;
pub mod grid;
pub mod input;
pub mod location;
pub mod player;
pub mod sync;
pub mod youtube;

pub use codec::{Decoded, DecodeAttempt, LocationFormat, decode, encode};
pub use grid::{GridError, GridState, StreamEntry, StreamId};
pub use location::Location;
pub use sync::{History, LocationSync, MemoryHistory};
pub use youtube::extract_video_id;
