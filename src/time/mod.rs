//! Capture time resolution
//!
//! A file's capture time defaults to its modification time and is replaced
//! by the first parseable metadata date field, probed in priority order.

pub mod exif;

use crate::error::MetadataError;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs::{File, Metadata};
use std::io::BufReader;
use tracing::debug;

pub use self::exif::{DateField, ExifDecoder, MetadataDecoder, TagLookup};

/// Source of the extracted timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Read from a metadata date field
    Metadata(DateField),
    /// From file system modification time
    ModifiedTime,
}

/// Result of timestamp extraction
#[derive(Debug, Clone)]
pub struct ExtractedTime {
    /// The extracted timestamp, in local wall-clock time
    pub timestamp: NaiveDateTime,
    /// Source of the timestamp
    pub source: TimeSource,
}

/// Modification time of a file as local wall-clock time
pub fn modified_time(metadata: &Metadata) -> std::io::Result<NaiveDateTime> {
    let modified = metadata.modified()?;
    let datetime: DateTime<Local> = modified.into();
    Ok(datetime.naive_local())
}

/// Resolve the capture time of an open file
///
/// Returns an error only when the decoder cannot make sense of the file at
/// all; the caller decides whether to fall back to `modified`. Decoded
/// metadata without a usable date field yields `modified`.
pub fn resolve_capture_time(
    reader: &mut BufReader<File>,
    modified: NaiveDateTime,
    decoder: &dyn MetadataDecoder,
) -> Result<ExtractedTime, MetadataError> {
    let tags = decoder.decode(reader)?;

    match exif::probe_date(&*tags) {
        Some((field, timestamp)) => Ok(ExtractedTime {
            timestamp,
            source: TimeSource::Metadata(field),
        }),
        None => {
            debug!("Metadata has no usable date field, keeping modification time");
            Ok(ExtractedTime {
                timestamp: modified,
                source: TimeSource::ModifiedTime,
            })
        }
    }
}
