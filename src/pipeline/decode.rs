//! Metadata decoder stage
//!
//! Dates each candidate, computes its destination and applies the advisory
//! existence pre-filter. The executor re-checks the destination before any
//! mutation; the check here only keeps hopeless requests out of its queue.

use super::RunStats;
use super::walker::Candidate;
use crate::config::{Config, FolderFormats, TransferMode};
use crate::error::DecodeError;
use crate::media::MediaKind;
use crate::time::{self, ExtractedTime, MetadataDecoder, TimeSource};
use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// A resolved (source, destination) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// `dest_root / folder(timestamp, kind) / basename(source)`
pub fn destination_path(
    dest_root: &Path,
    formats: &FolderFormats,
    kind: MediaKind,
    timestamp: &NaiveDateTime,
    source: &Path,
) -> Result<PathBuf, DecodeError> {
    let file_name = source.file_name().ok_or_else(|| DecodeError::NoFileName {
        path: source.to_path_buf(),
    })?;
    let folder = formats
        .folder_for(kind, timestamp)
        .map_err(|e| DecodeError::Template {
            path: source.to_path_buf(),
            source: Box::new(e),
        })?;
    Ok(dest_root.join(folder).join(file_name))
}

/// Decode one candidate into a transfer request
pub fn decode_candidate(
    candidate: &Candidate,
    config: &Config,
    decoder: &dyn MetadataDecoder,
) -> Result<TransferRequest, DecodeError> {
    let path = &candidate.path;

    let file = File::open(path).map_err(|e| DecodeError::Open {
        path: path.clone(),
        source: e,
    })?;
    let metadata = file.metadata().map_err(|e| DecodeError::Stat {
        path: path.clone(),
        source: e,
    })?;
    let modified = time::modified_time(&metadata).map_err(|e| DecodeError::Stat {
        path: path.clone(),
        source: e,
    })?;

    let mut reader = BufReader::new(file);
    let extracted = match time::resolve_capture_time(&mut reader, modified, decoder) {
        Ok(extracted) => extracted,
        Err(e) if config.require_metadata => {
            return Err(DecodeError::Metadata {
                path: path.clone(),
                source: e,
            });
        }
        Err(e) => {
            trace!(path = %path.display(), error = %e, "No metadata, using modification time");
            ExtractedTime {
                timestamp: modified,
                source: TimeSource::ModifiedTime,
            }
        }
    };

    let destination = destination_path(
        &config.dest_dir,
        &config.formats,
        candidate.kind,
        &extracted.timestamp,
        path,
    )?;

    prefilter(config, metadata.len(), &destination)?;

    trace!(
        source = %path.display(),
        destination = %destination.display(),
        time_source = ?extracted.source,
        timestamp = %extracted.timestamp,
        "Resolved destination"
    );

    Ok(TransferRequest {
        source: path.clone(),
        destination,
    })
}

/// Advisory destination check
///
/// Copy and move skip a destination that is at least as large as the
/// source, using the same adequacy rule as the executor. Larger sources go
/// through so the executor can overwrite or report the mismatch.
/// Delete-duplicates needs an existing destination.
fn prefilter(config: &Config, source_len: u64, destination: &Path) -> Result<(), DecodeError> {
    let existing = fs::metadata(destination).ok();

    match (config.mode, existing) {
        (TransferMode::DeleteDuplicates, Some(_)) => Ok(()),
        (TransferMode::DeleteDuplicates, None) => Err(DecodeError::DestinationMissing {
            destination: destination.to_path_buf(),
        }),
        (_, None) => Ok(()),
        (_, Some(dest)) if source_len > dest.len() => Ok(()),
        (_, Some(_)) => Err(DecodeError::DestinationExists {
            destination: destination.to_path_buf(),
        }),
    }
}

/// Decoder worker loop: runs until the candidate queue closes
pub fn decode_worker(
    candidates: Receiver<Candidate>,
    requests: Sender<TransferRequest>,
    config: &Config,
    decoder: &dyn MetadataDecoder,
    stats: &RunStats,
) {
    for candidate in candidates.iter() {
        match decode_candidate(&candidate, config, decoder) {
            Ok(request) => {
                stats.queued.fetch_add(1, Ordering::Relaxed);
                if requests.send(request).is_err() {
                    debug!("Request queue has no consumers, stopping decoder");
                    break;
                }
            }
            Err(e) => {
                debug!(path = %candidate.path.display(), reason = %e, "Dropped candidate");
                stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
