//! tracing setup for the daemon binary.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// a log file bigger than this is moved aside at startup
pub const ROTATE_AT: u64 = 1024 * 1024;

/// `RUST_LOG` if set, otherwise info (debug with `verbose`).
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Log to stderr, and to `log_file` too if given.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = open_log(path, ROTATE_AT)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true),
        )
        .with(file_layer)
        .try_init()
        .context("failed to install the log subscriber")?;
    Ok(())
}

fn rotated(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

/// Open `path` for appending, after moving it to `<path>.1` if it is larger than `limit`.
fn open_log(path: &Path, limit: u64) -> io::Result<File> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > limit => fs::rename(path, rotated(path))?,
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    OpenOptions::new().create(true).append(true).open(path)
}
