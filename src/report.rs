//! Console action report
//!
//! Every planned or executed filesystem action becomes one line on stdout,
//! in shell-command form, whether or not the run is a dry run.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// One reported action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Destination directory creation
    Mkdir(PathBuf),
    Copy { source: PathBuf, destination: PathBuf },
    Move { source: PathBuf, destination: PathBuf },
    Remove(PathBuf),
    /// Destination exists but the source is larger
    SizeMismatch { source: PathBuf, destination: PathBuf },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Mkdir(dir) => write!(f, "mkdir -p {}", dir.display()),
            Action::Copy { source, destination } => {
                write!(f, "cp {} {}", source.display(), destination.display())
            }
            Action::Move { source, destination } => {
                write!(f, "mv {} {}", source.display(), destination.display())
            }
            Action::Remove(path) => write!(f, "rm {}", path.display()),
            Action::SizeMismatch { source, destination } => {
                write!(f, "diff {} {}", source.display(), destination.display())
            }
        }
    }
}

/// Sink for action lines, shared by all executor workers
pub trait Reporter: Send + Sync {
    fn report(&self, action: &Action);
}

/// Prints each action as a line on stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, action: &Action) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", action);
    }
}

/// Keeps actions in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    actions: Mutex<Vec<Action>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the actions reported so far
    pub fn actions(&self) -> Vec<Action> {
        match self.actions.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, action: &Action) {
        match self.actions.lock() {
            Ok(mut guard) => guard.push(action.clone()),
            Err(poisoned) => poisoned.into_inner().push(action.clone()),
        }
    }
}
