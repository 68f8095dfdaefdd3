//! Transfer executor stage
//!
//! Re-validates each request against the destination as it is right now,
//! then copies, moves or deletes. Failures never escape a request: they are
//! reported as an outcome and the worker moves on.

use super::RunStats;
use super::decode::TransferRequest;
use crate::config::{Config, TransferMode};
use crate::error::{Error, Result};
use crate::report::{Action, Reporter};
use crossbeam_channel::Receiver;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Why delete-duplicates left a source alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotDuplicate {
    DestinationMissing,
    SourceMissing,
    /// Source and destination are the same file on disk
    SameFile,
    SizeDiffers,
}

/// What the executor did with a request
#[derive(Debug)]
pub enum TransferOutcome {
    /// Operation carried out, or only reported in dry-run mode
    Performed,
    /// Destination exists and is at least as large as the source
    SkippedExists,
    /// Destination exists, source is larger and overwriting is not allowed
    SkippedSizeMismatch,
    /// Destination could not be inspected
    SkippedUnverifiable,
    SkippedNotDuplicate(NotDuplicate),
    Failed(Error),
}

impl TransferOutcome {
    pub fn is_performed(&self) -> bool {
        matches!(self, TransferOutcome::Performed)
    }
}

/// Destination check result for copy and move
#[derive(Debug)]
enum Verdict {
    /// Destination is absent and must still be absent when written
    Create,
    /// Destination is smaller than the source and may be overwritten
    Replace,
    Skip(TransferOutcome),
}

/// Executes transfer requests for one run
pub struct Executor<'a> {
    config: &'a Config,
    reporter: &'a dyn Reporter,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a Config, reporter: &'a dyn Reporter) -> Self {
        Self { config, reporter }
    }

    /// Carry out one request in the configured mode
    pub fn execute(&self, request: &TransferRequest) -> TransferOutcome {
        match self.config.mode {
            TransferMode::Copy => self.copy(request),
            TransferMode::Move => self.relocate(request),
            TransferMode::DeleteDuplicates => self.delete_duplicate(request),
        }
    }

    /// Destination check run immediately before copy or move
    fn revalidate(&self, request: &TransferRequest) -> Verdict {
        match fs::metadata(&request.destination) {
            Ok(existing) => match fs::metadata(&request.source) {
                Ok(source) if source.len() > existing.len() => {
                    if self.config.allow_larger {
                        debug!(destination = %request.destination.display(), "Overwriting smaller destination");
                        Verdict::Replace
                    } else {
                        self.reporter.report(&Action::SizeMismatch {
                            source: request.source.clone(),
                            destination: request.destination.clone(),
                        });
                        Verdict::Skip(TransferOutcome::SkippedSizeMismatch)
                    }
                }
                _ => Verdict::Skip(TransferOutcome::SkippedExists),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Verdict::Create,
            Err(e) => {
                debug!(destination = %request.destination.display(), error = %e, "Cannot stat destination");
                Verdict::Skip(TransferOutcome::SkippedUnverifiable)
            }
        }
    }

    /// Another worker claimed the destination between the check and the write
    ///
    /// The destination is never touched again for this request; a fresh
    /// check decides how the skip is reported.
    fn lost_race(&self, request: &TransferRequest) -> TransferOutcome {
        debug!(destination = %request.destination.display(), "Destination appeared during transfer");
        match self.revalidate(request) {
            Verdict::Skip(outcome) => outcome,
            Verdict::Create | Verdict::Replace => TransferOutcome::SkippedExists,
        }
    }

    /// Create the destination's parent directory if it is missing
    fn ensure_parent(&self, destination: &Path) -> Result<()> {
        let Some(dir) = destination.parent() else {
            return Ok(());
        };
        if dir.is_dir() {
            return Ok(());
        }

        self.reporter.report(&Action::Mkdir(dir.to_path_buf()));
        if !self.config.dry_run {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn copy(&self, request: &TransferRequest) -> TransferOutcome {
        let replace = match self.revalidate(request) {
            Verdict::Create => false,
            Verdict::Replace => true,
            Verdict::Skip(outcome) => return outcome,
        };
        if let Err(e) = self.ensure_parent(&request.destination) {
            warn!(destination = %request.destination.display(), error = %e, "Failed to create directory");
            return TransferOutcome::Failed(e);
        }

        let action = Action::Copy {
            source: request.source.clone(),
            destination: request.destination.clone(),
        };
        if self.config.dry_run {
            self.reporter.report(&action);
            return TransferOutcome::Performed;
        }

        match copy_file(&request.source, &request.destination, replace) {
            Ok(()) => {}
            Err(e) if is_conflict(&e) => return self.lost_race(request),
            Err(e) => {
                warn!(
                    source = %request.source.display(),
                    destination = %request.destination.display(),
                    error = %e,
                    "Copy failed"
                );
                return TransferOutcome::Failed(e);
            }
        }

        if self.config.preserve_mtime {
            preserve_mtime(&request.source, &request.destination);
        }
        self.reporter.report(&action);
        TransferOutcome::Performed
    }

    fn relocate(&self, request: &TransferRequest) -> TransferOutcome {
        let replace = match self.revalidate(request) {
            Verdict::Create => false,
            Verdict::Replace => true,
            Verdict::Skip(outcome) => return outcome,
        };
        if let Err(e) = self.ensure_parent(&request.destination) {
            warn!(destination = %request.destination.display(), error = %e, "Failed to create directory");
            return TransferOutcome::Failed(e);
        }

        let action = Action::Move {
            source: request.source.clone(),
            destination: request.destination.clone(),
        };
        if self.config.dry_run {
            self.reporter.report(&action);
            return TransferOutcome::Performed;
        }

        let moved = if replace {
            fs::rename(&request.source, &request.destination).map_err(Error::from)
        } else {
            move_new(&request.source, &request.destination)
        };
        match moved {
            Ok(()) => {
                self.reporter.report(&action);
                TransferOutcome::Performed
            }
            Err(e) if is_conflict(&e) => self.lost_race(request),
            Err(e) => {
                warn!(
                    source = %request.source.display(),
                    destination = %request.destination.display(),
                    error = %e,
                    "Move failed"
                );
                TransferOutcome::Failed(e)
            }
        }
    }

    fn delete_duplicate(&self, request: &TransferRequest) -> TransferOutcome {
        let Ok(existing) = fs::metadata(&request.destination) else {
            return TransferOutcome::SkippedNotDuplicate(NotDuplicate::DestinationMissing);
        };
        let Ok(source) = fs::metadata(&request.source) else {
            return TransferOutcome::SkippedNotDuplicate(NotDuplicate::SourceMissing);
        };
        if same_file(&source, &existing, &request.source, &request.destination) {
            return TransferOutcome::SkippedNotDuplicate(NotDuplicate::SameFile);
        }
        if source.len() != existing.len() {
            return TransferOutcome::SkippedNotDuplicate(NotDuplicate::SizeDiffers);
        }

        self.reporter.report(&Action::Remove(request.source.clone()));
        if self.config.dry_run {
            return TransferOutcome::Performed;
        }

        match fs::remove_file(&request.source) {
            Ok(()) => TransferOutcome::Performed,
            Err(e) => {
                warn!(source = %request.source.display(), error = %e, "Remove failed");
                TransferOutcome::Failed(e.into())
            }
        }
    }
}

/// Executor worker loop: runs until the request queue closes
pub fn transfer_worker(requests: Receiver<TransferRequest>, executor: &Executor<'_>, stats: &RunStats) {
    for request in requests.iter() {
        let outcome = executor.execute(&request);
        debug!(source = %request.source.display(), ?outcome, "Transfer finished");
        stats.record(&outcome);
    }
}

/// Copy file contents and flush them to disk
///
/// Unless `replace` is set the destination must not exist yet, so two
/// workers racing for the same name cannot both write it. A destination
/// that was created but not completely written is removed.
fn copy_file(source: &Path, dest: &Path, replace: bool) -> Result<()> {
    let reader = BufReader::with_capacity(256 * 1024, File::open(source)?);

    let mut options = OpenOptions::new();
    options.write(true);
    if replace {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let writer = BufWriter::with_capacity(256 * 1024, options.open(dest)?);

    if let Err(e) = write_contents(reader, writer) {
        if let Err(cleanup) = fs::remove_file(dest) {
            debug!(destination = %dest.display(), error = %cleanup, "Could not remove partial copy");
        }
        return Err(e);
    }
    Ok(())
}

/// Move `source` to a destination that must not exist yet
///
/// A hard link claims the name atomically. Moves across devices, or onto
/// filesystems without links, fall back to an exclusive copy.
fn move_new(source: &Path, dest: &Path) -> Result<()> {
    match fs::hard_link(source, dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e.into()),
        Err(e) => {
            debug!(destination = %dest.display(), error = %e, "Hard link failed, copying instead");
            copy_file(source, dest, false)?;
            preserve_mtime(source, dest);
        }
    }
    fs::remove_file(source)?;
    Ok(())
}

fn is_conflict(error: &Error) -> bool {
    matches!(error, Error::Io(e) if e.kind() == io::ErrorKind::AlreadyExists)
}

fn write_contents(mut reader: BufReader<File>, mut writer: BufWriter<File>) -> Result<()> {
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

fn preserve_mtime(source: &Path, dest: &Path) {
    if let Ok(metadata) = fs::metadata(source)
        && let Ok(mtime) = metadata.modified()
        && let Err(e) = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime))
    {
        debug!(destination = %dest.display(), error = %e, "Could not preserve modification time");
    }
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata, _a_path: &Path, _b_path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &Metadata, _b: &Metadata, a_path: &Path, b_path: &Path) -> bool {
    match (a_path.canonicalize(), b_path.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => true,
    }
}
