//! Source tree walker
//!
//! Enumerates every file under the source root, drops excluded and
//! unclassified entries, and feeds the rest to the decoder queue.

use super::RunStats;
use crate::error::Result;
use crate::media::MediaKind;
use crossbeam_channel::Sender;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

/// A classified file waiting to be dated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// Path exclusion predicate, matched against the lowercased path
#[derive(Debug, Clone, Default)]
pub struct Exclusion {
    pattern: Option<Regex>,
}

impl Exclusion {
    /// Compile an optional pattern; `None` excludes nothing
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let pattern = pattern.map(Regex::new).transpose()?;
        Ok(Self { pattern })
    }

    pub fn is_excluded(&self, lower_path: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|re| re.is_match(lower_path))
    }
}

/// Turn a non-directory entry into a candidate, or `None` if it is skipped
pub fn classify(path: &Path, exclusion: &Exclusion) -> Option<Candidate> {
    let lower = path.to_string_lossy().to_lowercase();
    if exclusion.is_excluded(&lower) {
        trace!(path = %path.display(), "Excluded by pattern");
        return None;
    }

    let ext = Path::new(&lower).extension()?.to_str()?;
    let kind = MediaKind::from_extension(ext);
    kind.is_classified().then(|| Candidate {
        path: path.to_path_buf(),
        kind,
    })
}

/// Walk `root` and send every candidate to `queue`
///
/// Unreadable entries are skipped; the walk stops early only if every
/// decoder has gone away. The queue closes when `queue` is dropped on return.
pub fn walk(root: &Path, exclusion: &Exclusion, queue: Sender<Candidate>, stats: &RunStats) {
    walk_entries(WalkDir::new(root), exclusion, queue, stats);
}

fn walk_entries<I, E>(entries: I, exclusion: &Exclusion, queue: Sender<Candidate>, stats: &RunStats)
where
    I: IntoIterator<Item = std::result::Result<DirEntry, E>>,
    E: fmt::Display,
{
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                stats.walk_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let Some(candidate) = classify(entry.path(), exclusion) else {
            continue;
        };

        stats.discovered.fetch_add(1, Ordering::Relaxed);
        if queue.send(candidate).is_err() {
            debug!("Candidate queue has no consumers, stopping walk");
            break;
        }
    }
}
