//! copyphotos - organize photos, RAW files and movies by capture date
//!
//! This library provides a concurrent pipeline that:
//! - Walks a source tree and classifies media files by extension
//! - Dates each file from EXIF metadata, falling back to modification time
//! - Computes a `dest/<date folder>/<name>` target per media kind
//! - Copies, moves, or removes already-present duplicates, with a dry-run mode

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod report;
pub mod time;

pub use cli::Cli;
pub use config::{Config, ConfigError, FolderFormats, TransferMode};
pub use error::{DecodeError, Error, Result};
pub use media::MediaKind;
pub use pipeline::{Pipeline, RunSummary, TransferOutcome, TransferRequest};
pub use report::{Action, ConsoleReporter, RecordingReporter, Reporter};
