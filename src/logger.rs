//! Session logger: one log file per run, truncated at start-up.
//!
//! Log location (via [`init`]):
//!   Windows:  `%APPDATA%\PixelForge\pixelforge.log`
//!   Linux:    `~/.local/share/PixelForge/pixelforge.log`
//!   macOS:    `~/Library/Application Support/PixelForge/pixelforge.log`
//!
//! Anywhere in the crate use `log_info!` / `log_warn!` / `log_err!`.  Until a
//! logger is initialised those macros cost one atomic load and write nothing,
//! so library users that never call [`init`] get a silent engine.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Path of the active log file, if one was opened.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

pub fn is_enabled() -> bool {
    LOG_FILE.get().is_some()
}

/// Append a raw line.  I/O errors are swallowed so logging never takes the
/// engine down.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Append a timestamped, level-tagged line.
pub fn write(level: Level, msg: &str) {
    if !is_enabled() {
        return;
    }
    write_line(&format!("[{}] [{}] {}", timestamp(), level.tag(), msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::logger::is_enabled() {
            $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if $crate::logger::is_enabled() {
            $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        if $crate::logger::is_enabled() {
            $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
        }
    };
}

/// Open the default per-user log file.  Failure is reported on stderr and
/// leaves logging disabled.
pub fn init() {
    let path = data_dir().join("PixelForge").join("pixelforge.log");
    if let Err(e) = init_at(&path) {
        eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
    }
}

/// Open (truncating) `path` as the session log and install a panic hook
/// that mirrors panics into it.  Only the first successful call takes effect.
pub fn init_at(path: &Path) -> io::Result<()> {
    if is_enabled() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    let _ = LOG_PATH.set(path.to_path_buf());
    let _ = LOG_FILE.set(Mutex::new(file));

    write_line(&format!("=== PixelForge session started (unix {}) ===", unix_seconds()));
    write_line(&format!("Log file: {}", path.display()));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
    Ok(())
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

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    let secs = unix_seconds();
    format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_clock_shaped() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
        assert_eq!(ts.as_bytes()[5], b':');
    }

    #[test]
    fn level_tags() {
        assert_eq!(Level::Info.tag(), "INFO");
        assert_eq!(Level::Warn.tag(), "WARN");
        assert_eq!(Level::Error.tag(), "ERROR");
    }
}
