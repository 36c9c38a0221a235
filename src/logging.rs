use std::path::{Path, PathBuf};
use tracing::{warn, Level};

use crate::paths::LOG_FILE;

fn max_level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Writes logs to `<log_dir>/voidspace.log`, `DEBUG` and up when `debug`
/// is set, `INFO` otherwise.
pub fn init(log_dir: &Path, debug: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(log_dir)?;

    tracing_subscriber::fmt()
        .with_writer(file_appender)
        .with_max_level(max_level(debug))
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}

pub fn init_stderr(debug: bool) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level(debug))
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}

/// Logs to a file under `log_dir` when it resolves and is writable, to
/// stderr otherwise. Returns the directory actually used.
pub fn init_with_fallback(log_dir: anyhow::Result<PathBuf>, debug: bool) -> Option<PathBuf> {
    match log_dir.and_then(|dir| init(&dir, debug).map(|_| dir)) {
        Ok(dir) => Some(dir),
        Err(e) => {
            if let Err(stderr_error) = init_stderr(debug) {
                eprintln!("{}", stderr_error);
            }
            warn!("File logging unavailable, logging to stderr: {}", e);
            None
        }
    }
}
