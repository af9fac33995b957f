//! Run logging
//!
//! Each export or import run gets an append-only main log and an error-only
//! log, both plain text and named after the run timestamp. Console output
//! mirrors every entry with a colour per severity.

use crate::error::{GroupSyncError, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Keeps the file writers alive (and flushed) for the duration of a run
pub struct RunLogs {
    pub main_log: PathBuf,
    pub error_log: PathBuf,
    _guards: Vec<WorkerGuard>,
}

/// Main and error log file names for a run
pub fn log_file_names(run_name: &str, timestamp: &str) -> (String, String) {
    (
        format!("{}_{}.log", run_name, timestamp),
        format!("{}_Errors_{}.log", run_name, timestamp),
    )
}

/// Install the tracing subscriber for a run
///
/// `verbose` raises the file level to DEBUG and adds a stderr layer that
/// honours `RUST_LOG`.
pub fn init_run_logging(
    log_dir: &Path,
    run_name: &str,
    timestamp: &str,
    verbose: bool,
) -> Result<RunLogs> {
    fs::create_dir_all(log_dir).map_err(|e| {
        GroupSyncError::ConfigError(format!(
            "Failed to create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let (main_name, error_name) = log_file_names(run_name, timestamp);
    let (main_writer, main_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, &main_name));
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, &error_name));

    let file_level = if verbose { "debug" } else { "info" };
    let mut layers = Vec::new();

    layers.push(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(main_writer)
            .with_filter(EnvFilter::new(format!("groupsync={}", file_level)))
            .boxed(),
    );

    layers.push(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(error_writer)
            .with_filter(LevelFilter::ERROR)
            .boxed(),
    );

    if verbose {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("groupsync=debug"));
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| GroupSyncError::ConfigError(format!("Failed to initialize logging: {}", e)))?;

    let logs = RunLogs {
        main_log: log_dir.join(main_name),
        error_log: log_dir.join(error_name),
        _guards: vec![main_guard, error_guard],
    };

    tracing::info!(
        main_log = %logs.main_log.display(),
        error_log = %logs.error_log.display(),
        "Logging initialized"
    );

    Ok(logs)
}

/// Verbose-only stderr logging for commands that do not open run logs
pub fn init_console_logging(verbose: bool) {
    if verbose {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("groupsync=debug")
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Record a run-ending error in the run logs before it propagates
///
/// `main` prints the error to the console, so only the log files get it here.
pub fn log_failure<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::error!("Run aborted: {}", e);
    }
    result
}

pub fn info(message: &str) {
    println!("{}", message);
    tracing::info!("{}", message);
}

pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message.yellow());
    tracing::warn!("{}", message);
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message.green());
    tracing::info!("SUCCESS {}", message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.red());
    tracing::error!("{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_names_embed_timestamp() {
        let (main, errors) = log_file_names("GroupImport", "20260114_093000");
        assert_eq!(main, "GroupImport_20260114_093000.log");
        assert_eq!(errors, "GroupImport_Errors_20260114_093000.log");
    }
}
