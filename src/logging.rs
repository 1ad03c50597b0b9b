//! Logging setup
//!
//! `env_logger` on stderr, optionally teed into a log file under the user's
//! home directory. `RUST_LOG` overrides the default filter, e.g.
//! `RUST_LOG=midisplit::trace=debug` shows every channel assignment.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static LOG_FILE: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Get the log file path (in user's home directory)
pub fn get_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".midisplit")
        .join("logs")
        .join("midisplit.log")
}

/// Path of the file logging was initialized with, if any
pub fn active_log_file() -> Option<PathBuf> {
    LOG_FILE.lock().clone()
}

/// Writes every line to stderr and the log file
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Dev output should not stop because the file write failed
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

/// Initialize logging with `default_level` unless `RUST_LOG` is set
///
/// With `to_file`, lines are also appended to [`get_log_path`]. Calling this
/// twice is harmless; the second call is ignored.
pub fn init_logging(default_level: &str, to_file: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            timestamp,
            record.level(),
            record.target(),
            record.args()
        )
    });

    if to_file {
        let log_path = get_log_path();

        // Create logs directory if it doesn't exist
        if let Some(parent) = log_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
                *LOG_FILE.lock() = Some(log_path);
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", log_path.display(), e),
        }
    }

    if builder.try_init().is_ok() {
        log::info!("midisplit {} started", env!("CARGO_PKG_VERSION"));
    }
}

/// Get the log file contents
pub fn read_log_file() -> Result<String, String> {
    let log_path = get_log_path();

    if !log_path.exists() {
        return Ok("No log file yet.".to_string());
    }

    fs::read_to_string(&log_path).map_err(|e| format!("Failed to read log file: {}", e))
}

/// Clear the log file
pub fn clear_log_file() -> Result<(), String> {
    let log_path = get_log_path();

    if log_path.exists() {
        fs::write(&log_path, "").map_err(|e| format!("Failed to clear log file: {}", e))?;
    }

    log::info!("Log file cleared");
    Ok(())
}

/// Get log file size in bytes
pub fn get_log_file_size() -> Result<u64, String> {
    let log_path = get_log_path();

    if !log_path.exists() {
        return Ok(0);
    }

    fs::metadata(&log_path)
        .map(|m| m.len())
        .map_err(|e| format!("Failed to get log file size: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_layout() {
        let path = get_log_path();
        assert!(path.ends_with(".midisplit/logs/midisplit.log"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging("warn", false);
        init_logging("debug", false);
        log::warn!("still logging");
        assert!(active_log_file().is_none());
    }
}
