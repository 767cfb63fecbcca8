//! Logging init: file under the XDG state dir, or fallback to stderr.
//!
//! Progress lines for the user go to stdout; tracing output stays out of the
//! way in `~/.local/state/pget/pget.log`.

use anyhow::Result;
use std::fs;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pget=debug"))
}

/// Initialize structured logging to `~/.local/state/pget/pget.log`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can fall
/// back to [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pget")?;
    let log_dir = xdg_dirs.get_state_home().join("pget");
    fs::create_dir_all(&log_dir)?;
    let log_file_path = log_dir.join("pget.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    tracing::info!("pget logging initialized at {}", log_file_path.display());
    Ok(())
}

/// Initialize logging to stderr only. Use when [`init_logging`] fails so the
/// CLI doesn't crash over an unwritable log directory.
pub fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
