use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GMAILKIT_LOG";

/// Opt-in file logging. Nothing is installed unless `GMAILKIT_LOG` is set.
pub fn init_logging() {
    let Ok(raw) = std::env::var(LOG_ENV) else {
        return;
    };
    let path = log_file_path();
    let _ = std::fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new("/tmp")));
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let filter = EnvFilter::try_new(log_directive(&raw)).unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

pub fn log_file_path() -> PathBuf {
    xdg_state_dir().join("gmailkit").join("gmailkit.log")
}

fn xdg_state_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

// `GMAILKIT_LOG=1` reads as "turn it on", not as a target named "1".
fn log_directive(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "1" || trimmed.eq_ignore_ascii_case("true") {
        "debug".to_string()
    } else {
        trimmed.to_string()
    }
}
