//! CLI argument parsing with clap

use crate::config::{Config, TransferMode};
use clap::Parser;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::path::PathBuf;

/// copyphotos - sort photos, RAW files and movies into date folders
///
/// Each file's date comes from its EXIF capture time when available and
/// from its modification time otherwise. Files land in
/// DEST/date-folder/original-name.
#[derive(Parser, Debug)]
#[command(name = "copyphotos")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source directory to scan
    #[arg(required_unless_present_any = ["config", "print_config"])]
    pub source: Option<PathBuf>,

    /// Destination root for date folders
    #[arg(required_unless_present_any = ["config", "print_config"])]
    pub dest: Option<PathBuf>,

    /// Path to configuration file (TOML format)
    ///
    /// CLI arguments override settings from the file.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Dry run - print what would be done without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Copy files instead of moving them
    #[arg(long = "cp", conflicts_with_all = ["delete", "mode"])]
    pub copy: bool,

    /// Delete sources that already exist at their destination with the same size
    #[arg(long = "del", conflicts_with = "mode")]
    pub delete: bool,

    /// Transfer mode (default: move)
    #[arg(long, value_enum)]
    pub mode: Option<TransferMode>,

    /// Overwrite a destination when the source is larger
    #[arg(long = "large")]
    pub allow_larger: bool,

    /// Exclude files whose lowercase path matches this regular expression
    #[arg(short = 'x', long)]
    pub exclude: Option<String>,

    /// Folder template for images (strftime syntax)
    #[arg(short = 'f', long = "format")]
    pub folder_format: Option<String>,

    /// Folder template for RAW files
    #[arg(short = 'r', long)]
    pub raw_format: Option<String>,

    /// Folder template for movies
    #[arg(short = 'm', long)]
    pub movie_format: Option<String>,

    /// Number of metadata decoder workers
    #[arg(long)]
    pub decoders: Option<usize>,

    /// Number of transfer workers (default: 2, or 1 when deleting)
    #[arg(long)]
    pub executors: Option<usize>,

    /// Skip files without readable metadata instead of using their modification time
    #[arg(long)]
    pub require_metadata: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub print_config: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Write the log file as JSON
    #[arg(long, requires = "log_file")]
    pub json_log: bool,
}

impl Cli {
    /// Parse arguments, yielding `None` when the source/destination pair is missing
    ///
    /// A bare invocation asks for usage; it is not treated as an error.
    pub fn try_parse_paths<I, T>(args: I) -> Result<Option<Self>, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(cli) => Ok(Some(cli)),
            Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Transfer mode selected on the command line, if any
    pub fn mode(&self) -> Option<TransferMode> {
        if self.copy {
            Some(TransferMode::Copy)
        } else if self.delete {
            Some(TransferMode::DeleteDuplicates)
        } else {
            self.mode
        }
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref source) = self.source {
            config.source_dir = source.clone();
        }
        if let Some(ref dest) = self.dest {
            config.dest_dir = dest.clone();
        }
        if let Some(mode) = self.mode() {
            config.mode = mode;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.allow_larger {
            config.allow_larger = true;
        }
        if let Some(ref exclude) = self.exclude {
            config.exclude = Some(exclude.clone());
        }
        if let Some(ref format) = self.folder_format {
            config.formats.default = format.clone();
        }
        if let Some(ref format) = self.raw_format {
            config.formats.raw = format.clone();
        }
        if let Some(ref format) = self.movie_format {
            config.formats.movie = format.clone();
        }
        if let Some(decoders) = self.decoders {
            config.decoder_workers = decoders;
        }
        if let Some(executors) = self.executors {
            config.executor_workers = Some(executors);
        }
        if self.require_metadata {
            config.require_metadata = true;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
