//! Run coordinator
//!
//! Wires the three stages together with bounded queues:
//!
//! ```text
//! walker ──(candidates, bounded)──► decoder × N ──(requests, bounded)──► executor × M
//! ```
//!
//! Each queue closes only once every producer feeding it has returned: the
//! walker drops its sender when the tree is exhausted, and the coordinator
//! drops the last request sender after joining every decoder. Full queues
//! block their producers, so a slow executor throttles decoding and walking.

pub mod decode;
pub mod transfer;
pub mod walker;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::report::{ConsoleReporter, Reporter};
use crate::time::{ExifDecoder, MetadataDecoder};
use crossbeam_channel::bounded;
use std::fmt;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{Level, error, info, span};

pub use decode::{TransferRequest, decode_candidate, destination_path};
pub use transfer::{Executor, NotDuplicate, TransferOutcome};
pub use walker::{Candidate, Exclusion};

/// Live counters shared by all stages of one run
#[derive(Debug, Default)]
pub struct RunStats {
    /// Classified files emitted by the walker
    pub discovered: AtomicUsize,
    /// Entries the walker could not read
    pub walk_errors: AtomicUsize,
    /// Candidates turned into transfer requests
    pub queued: AtomicUsize,
    /// Candidates dropped by the decoder
    pub dropped: AtomicUsize,
    pub performed: AtomicUsize,
    pub skipped: AtomicUsize,
    pub failed: AtomicUsize,
}

impl RunStats {
    pub fn record(&self, outcome: &TransferOutcome) {
        let counter = match outcome {
            TransferOutcome::Performed => &self.performed,
            TransferOutcome::Failed(_) => &self.failed,
            _ => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            discovered: self.discovered.load(Ordering::Relaxed),
            walk_errors: self.walk_errors.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            performed: self.performed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Final counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub walk_errors: usize,
    pub queued: usize,
    pub dropped: usize,
    pub performed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Discovered: {}, Queued: {}, Dropped: {}, Performed: {}, Skipped: {}, Failed: {}, Unreadable: {}",
            self.discovered,
            self.queued,
            self.dropped,
            self.performed,
            self.skipped,
            self.failed,
            self.walk_errors
        )
    }
}

/// A configured, single-shot organizing run
pub struct Pipeline {
    config: Config,
    exclusion: Exclusion,
    decoder: Arc<dyn MetadataDecoder>,
    reporter: Arc<dyn Reporter>,
}

impl Pipeline {
    /// Validate `config` and prepare a run with the EXIF decoder and console report
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let exclusion = Exclusion::new(config.exclude.as_deref())?;

        Ok(Self {
            config,
            exclusion,
            decoder: Arc::new(ExifDecoder),
            reporter: Arc::new(ConsoleReporter),
        })
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn MetadataDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run all stages to completion
    ///
    /// Blocks until the executors have drained the request queue. The only
    /// error is failing to open the source root; per-file problems are
    /// counted in the summary.
    pub fn run(&self) -> Result<RunSummary> {
        let _span = span!(Level::INFO, "pipeline_run").entered();
        let config = &self.config;

        check_source_root(config)?;

        let decoder_workers = config.decoder_workers;
        let executor_workers = config.executor_workers();
        info!(
            source = %config.source_dir.display(),
            destination = %config.dest_dir.display(),
            mode = config.mode.label(),
            dry_run = config.dry_run,
            decoder_workers,
            executor_workers,
            "Starting run"
        );

        let stats = RunStats::default();
        let executor = Executor::new(config, self.reporter.as_ref());
        let decoder = self.decoder.as_ref();
        let exclusion = &self.exclusion;

        let (candidate_tx, candidate_rx) = bounded(config.candidate_queue);
        let (request_tx, request_rx) = bounded(config.request_queue);

        thread::scope(|s| -> Result<()> {
            let stats = &stats;
            let executor = &executor;

            for id in 0..executor_workers {
                let requests = request_rx.clone();
                thread::Builder::new()
                    .name(format!("executor-{}", id))
                    .spawn_scoped(s, move || transfer::transfer_worker(requests, executor, stats))?;
            }
            drop(request_rx);

            let mut producers = Vec::with_capacity(decoder_workers + 1);
            for id in 0..decoder_workers {
                let candidates = candidate_rx.clone();
                let requests = request_tx.clone();
                producers.push(
                    thread::Builder::new()
                        .name(format!("decoder-{}", id))
                        .spawn_scoped(s, move || {
                            decode::decode_worker(candidates, requests, config, decoder, stats)
                        })?,
                );
            }
            drop(candidate_rx);

            let root = config.source_dir.as_path();
            producers.push(
                thread::Builder::new()
                    .name("walker".into())
                    .spawn_scoped(s, move || walker::walk(root, exclusion, candidate_tx, stats))?,
            );

            for handle in producers {
                if handle.join().is_err() {
                    error!("Producer thread panicked");
                }
            }
            // Every decoder has returned; closing the request queue lets executors drain and exit
            drop(request_tx);
            Ok(())
        })?;

        let summary = stats.summary();
        info!("{}", summary);
        Ok(summary)
    }
}

/// Fail the run up front if the source root cannot be read
fn check_source_root(config: &Config) -> Result<()> {
    let root = &config.source_dir;
    let source_error = |e| Error::SourceRoot {
        path: root.clone(),
        source: e,
    };

    let metadata = fs::metadata(root).map_err(source_error)?;
    if metadata.is_dir() {
        fs::read_dir(root).map_err(source_error)?;
    }
    Ok(())
}
