//! Session logger: routes the engine's `tracing` events to a single file.
//!
//! The file is **truncated at each launch**, so it only ever holds output from
//! the most recent run.
//!
//! Default location:
//!   Windows:  `%APPDATA%\photoforge\photoforge.log`
//!   Linux:    `~/.local/share/photoforge/photoforge.log`
//!   macOS:    `~/Library/Application Support/photoforge/photoforge.log`
//!
//! `RUST_LOG` overrides the level filter (default `info`, `debug` with `-v`).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Returns the log path on success; a log
/// file that cannot be opened is reported on stderr and otherwise ignored.
pub fn init(log_file: Option<&Path>, verbose: bool) -> Option<PathBuf> {
    let path = log_file.map(Path::to_path_buf).unwrap_or_else(log_file_path);

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let mut file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return None;
        }
    };

    let _ = writeln!(file, "=== photoforge session started {} ===", human_timestamp());
    let _ = writeln!(file, "Log file: {}", path.display());
    let _ = writeln!(file);

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        // Someone else already owns the global subscriber.
        return None;
    }

    // Mirror panics into the log, then run the default handler.
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        tracing::error!("PANIC: {}", panic);
        prev(panic);
    }));

    Some(path)
}

fn log_file_path() -> PathBuf {
    data_dir().join("photoforge").join("photoforge.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}
