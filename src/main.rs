//! copyphotos - command-line entry point

use anyhow::{Context, Result};
use clap::CommandFactory;
use copyphotos::{Cli, Config, Pipeline};
use std::path::Path;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = match Cli::try_parse_paths(std::env::args_os()) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            Cli::command().print_help()?;
            return Ok(());
        }
        Err(e) => e.exit(),
    };

    if cli.print_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let _guard = setup_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "copyphotos starting");

    let config = load_config(&cli)?;
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    check_paths(&config);

    println!(
        "Mode: {}{}",
        config.mode.label(),
        if config.dry_run { " (dry run)" } else { "" }
    );

    // `_guard` must drop before the process ends or the log file loses its tail
    let summary = Pipeline::new(config)?
        .run()
        .inspect_err(|e| error!(error = %e, "Run failed"))?;
    info!(%summary, "Run complete");
    Ok(())
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config {
        Some(ref path) => {
            info!(config_file = %path.display(), "Loading configuration from file");
            let file_config = Config::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            cli.merge_with_config(file_config)
        }
        None => cli.to_config(),
    };

    config.validate()?;
    Ok(config)
}

/// Report missing roots the way the run will experience them
fn check_paths(config: &Config) {
    if !config.source_dir.exists() {
        eprintln!("Path does not exist: {}", config.source_dir.display());
    }
    if !config.dest_dir.exists() {
        warn!(dest = %config.dest_dir.display(), "Destination does not exist yet and will be created");
    }
}

/// Console logging on stderr, plus an optional log file
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let Some(ref log_path) = cli.log_file else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(open_log_file(log_path)?);

    if cli.json_log {
        subscriber
            .with(fmt::layer().json().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(Some(guard))
}

fn open_log_file(log_path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))
}
