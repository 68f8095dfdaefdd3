//! Error types for copyphotos

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for copyphotos operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for copyphotos
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot traverse source directory {path}: {source}")]
    SourceRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to format folder name with template '{template}'")]
    Template { template: String },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// Failure of the metadata decoder to produce a tag lookup at all
#[derive(Error, Debug)]
#[error("metadata decode failed: {0}")]
pub struct MetadataError(pub String);

/// Failure to read a single field from decoded metadata
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagError {
    #[error("field not present")]
    NotFound,

    #[error("field is not a string value")]
    NotString,
}

/// Why the decode stage dropped a candidate without emitting a transfer
///
/// None of these produce console output; they are logged at debug level
/// and returned so callers can tell skips apart.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no usable metadata in {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: MetadataError,
    },

    #[error("failed to compute folder for {path}: {source}")]
    Template { path: PathBuf, source: Box<Error> },

    #[error("source has no file name: {path}")]
    NoFileName { path: PathBuf },

    #[error("destination already exists: {destination}")]
    DestinationExists { destination: PathBuf },

    #[error("no duplicate at destination: {destination}")]
    DestinationMissing { destination: PathBuf },
}
