//! Configuration types for copyphotos

use crate::error::{Error, Result};
use crate::media::MediaKind;
use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Folder template used when none is configured: `2024/2024-01-15`
pub const DEFAULT_FOLDER_FORMAT: &str = "%Y/%Y-%m-%d";

/// What the executor does with each resolved (source, destination) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
    /// Copy files to destination, leaving the source untouched
    Copy,
    /// Rename files into the destination tree
    #[default]
    Move,
    /// Remove sources that already have an identical-size copy at the destination
    DeleteDuplicates,
}

impl TransferMode {
    /// Default executor pool size for this mode
    ///
    /// Deletion is irreversible, so it is serialized onto a single worker.
    pub fn default_workers(&self) -> usize {
        match self {
            TransferMode::Copy | TransferMode::Move => 2,
            TransferMode::DeleteDuplicates => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransferMode::Copy => "copy",
            TransferMode::Move => "move",
            TransferMode::DeleteDuplicates => "delete",
        }
    }
}

/// strftime templates producing the date folder for each media kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderFormats {
    /// Images, TIFFs and anything not RAW or movie
    pub default: String,
    /// RAW camera files
    pub raw: String,
    /// Movie clips
    pub movie: String,
}

impl Default for FolderFormats {
    fn default() -> Self {
        Self {
            default: DEFAULT_FOLDER_FORMAT.into(),
            raw: DEFAULT_FOLDER_FORMAT.into(),
            movie: DEFAULT_FOLDER_FORMAT.into(),
        }
    }
}

impl FolderFormats {
    /// Select the template for a media kind
    pub fn template_for(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Raw => &self.raw,
            MediaKind::Movie => &self.movie,
            _ => &self.default,
        }
    }

    /// Expand the template for `kind` at `timestamp` into a relative folder
    pub fn folder_for(&self, kind: MediaKind, timestamp: &NaiveDateTime) -> Result<String> {
        format_template(self.template_for(kind), timestamp)
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        [self.default.as_str(), self.raw.as_str(), self.movie.as_str()].into_iter()
    }
}

/// Format a timestamp without panicking on bad specifiers
fn format_template(template: &str, timestamp: &NaiveDateTime) -> Result<String> {
    let mut folder = String::new();
    write!(folder, "{}", timestamp.format(template)).map_err(|_| Error::Template {
        template: template.to_string(),
    })?;
    Ok(folder)
}

/// Configuration for a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the tree to scan
    pub source_dir: PathBuf,

    /// Root of the date-organized destination tree
    pub dest_dir: PathBuf,

    /// Transfer mode
    pub mode: TransferMode,

    /// Report actions without touching the filesystem
    pub dry_run: bool,

    /// Overwrite an existing destination when the source is strictly larger
    pub allow_larger: bool,

    /// Regular expression matched against lowercase paths; matches are skipped
    pub exclude: Option<String>,

    /// Number of metadata decoder workers
    pub decoder_workers: usize,

    /// Number of transfer workers (mode default when unset)
    pub executor_workers: Option<usize>,

    /// Capacity of the walker -> decoder queue
    pub candidate_queue: usize,

    /// Capacity of the decoder -> executor queue
    pub request_queue: usize,

    /// Drop files whose metadata cannot be decoded instead of using mtime
    pub require_metadata: bool,

    /// Carry the source modification time over to copies
    pub preserve_mtime: bool,

    /// Verbose output
    pub verbose: bool,

    /// Folder templates
    pub formats: FolderFormats,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            dest_dir: PathBuf::new(),
            mode: TransferMode::default(),
            dry_run: false,
            allow_larger: false,
            exclude: None,
            decoder_workers: 4,
            executor_workers: None,
            candidate_queue: 32,
            request_queue: 16,
            require_metadata: false,
            preserve_mtime: true,
            verbose: false,
            formats: FolderFormats::default(),
        }
    }
}

impl Config {
    /// Effective executor pool size
    pub fn executor_workers(&self) -> usize {
        self.executor_workers
            .unwrap_or_else(|| self.mode.default_workers())
    }

    /// Check the configuration before any worker starts
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath { what: "source" });
        }
        if self.dest_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath { what: "destination" });
        }
        if self.decoder_workers == 0 {
            return Err(ConfigError::ZeroSized { what: "decoder_workers" });
        }
        if self.executor_workers() == 0 {
            return Err(ConfigError::ZeroSized { what: "executor_workers" });
        }
        if self.candidate_queue == 0 {
            return Err(ConfigError::ZeroSized { what: "candidate_queue" });
        }
        if self.request_queue == 0 {
            return Err(ConfigError::ZeroSized { what: "request_queue" });
        }

        for template in self.formats.iter() {
            validate_template(template)?;
        }

        if let Some(pattern) = &self.exclude {
            regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidExclude {
                pattern: pattern.clone(),
                source: e,
            })?;
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# copyphotos configuration file (TOML)

# Tree to scan and tree to fill
source_dir = "/media/card/DCIM"
dest_dir = "/home/me/Pictures"

# "copy", "move" or "delete-duplicates"
# - delete-duplicates removes a source only when a same-size copy
#   already sits at its computed destination
mode = "move"

# Print what would happen without touching any file
dry_run = true

# Overwrite an existing destination when the source is strictly larger
allow_larger = false

# Skip files whose lowercase path matches this regular expression
# exclude = "/\\.thumbnails/"

# Worker pools (executor_workers defaults to 2, or 1 for delete-duplicates)
decoder_workers = 4
# executor_workers = 2

# Queue capacities between stages
candidate_queue = 32
request_queue = 16

# Drop files with unreadable metadata instead of falling back to mtime
require_metadata = false

# Keep the source modification time on copied files
preserve_mtime = true

verbose = false

# Folder templates (strftime syntax, "/" creates nested folders)
[formats]
default = "%Y/%Y-%m-%d"
raw = "%Y/%Y-%m-%d"
movie = "%Y/%Y-%m-%d"
"#
        .to_string()
    }
}

/// Reject templates that cannot be formatted or that leave the destination root
fn validate_template(template: &str) -> std::result::Result<(), ConfigError> {
    if StrftimeItems::new(template).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTemplate {
            template: template.to_string(),
        });
    }

    let sample = NaiveDateTime::default();
    let folder = format_template(template, &sample).map_err(|_| ConfigError::InvalidTemplate {
        template: template.to_string(),
    })?;

    let path = Path::new(&folder);
    let mut components = path.components().peekable();
    if components.peek().is_none() {
        return Err(ConfigError::InvalidTemplate {
            template: template.to_string(),
        });
    }
    if components.any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
        return Err(ConfigError::EscapingTemplate {
            template: template.to_string(),
        });
    }

    Ok(())
}

/// Errors that can occur when loading, saving or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError { source: toml::ser::Error },
    /// Source or destination root not given
    MissingPath { what: &'static str },
    /// A worker count or queue capacity of zero
    ZeroSized { what: &'static str },
    /// Template with unknown specifiers or an empty expansion
    InvalidTemplate { template: String },
    /// Template producing an absolute path or `..`
    EscapingTemplate { template: String },
    /// Exclusion pattern that does not compile
    InvalidExclude {
        pattern: String,
        source: regex::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
            ConfigError::MissingPath { what } => {
                write!(f, "No {} directory given", what)
            }
            ConfigError::ZeroSized { what } => {
                write!(f, "{} must be at least 1", what)
            }
            ConfigError::InvalidTemplate { template } => {
                write!(f, "Invalid folder template '{}'", template)
            }
            ConfigError::EscapingTemplate { template } => {
                write!(f, "Folder template '{}' must stay inside the destination", template)
            }
            ConfigError::InvalidExclude { pattern, source } => {
                write!(f, "Invalid exclude pattern '{}': {}", pattern, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
            ConfigError::InvalidExclude { source, .. } => Some(source),
            _ => None,
        }
    }
}
