//! Log file locations for the panel binary
//!
//! Logs go to `$XDG_STATE_HOME/shell-panel/logs/` (usually
//! `~/.local/state/shell-panel/logs/`), one `shell-panel-{PID}.log` per run.
//! Logs left behind by processes that are no longer running are removed on
//! startup once they are a day old.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

const APP_DIR: &str = "shell-panel";

/// Logs of dead processes younger than this are kept
const CLEANUP_AGE: Duration = Duration::from_secs(24 * 60 * 60);

static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// The log directory, created on first use. Falls back to the temp dir.
pub fn log_dir() -> &'static PathBuf {
    LOG_DIR.get_or_init(|| {
        let fallback = std::env::temp_dir().join(format!("{APP_DIR}-logs"));
        let dir = state_log_dir().unwrap_or_else(|| fallback.clone());

        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Failed to create log directory {:?}: {}", dir, e);
            return fallback;
        }
        dir
    })
}

fn state_log_dir() -> Option<PathBuf> {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(state_home);
        if path.is_absolute() {
            return Some(path.join(APP_DIR).join("logs"));
        }
    }
    dirs::home_dir().map(|home| home.join(".local").join("state").join(APP_DIR).join("logs"))
}

/// `{log_dir}/shell-panel-{PID}.log`
pub fn main_log_path() -> PathBuf {
    log_dir().join(format!("{APP_DIR}-{}.log", std::process::id()))
}

/// Remove stale per-PID logs of dead processes.
pub fn cleanup_stale_logs() {
    let removed = cleanup_stale_logs_in_dir(log_dir(), std::process::id(), CLEANUP_AGE);
    if removed > 0 {
        tracing::info!("Removed {} stale log file(s)", removed);
    }
}

/// Returns the number of files removed.
fn cleanup_stale_logs_in_dir(dir: &Path, current_pid: u32, min_age: Duration) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = extract_pid_from_filename(&name.to_string_lossy()) else {
            continue;
        };
        if pid == current_pid || is_process_running(pid) {
            continue;
        }
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file || !is_file_older_than(&entry.path(), min_age) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => tracing::debug!("Failed to remove stale log {:?}: {}", entry.path(), e),
        }
    }
    removed
}

fn is_file_older_than(path: &Path, age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|elapsed| elapsed >= age)
}

/// PID from a name like `shell-panel-12345.log`
fn extract_pid_from_filename(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(".log")?;
    let (_, pid) = stem.rsplit_once('-')?;
    pid.parse().ok()
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // Signal 0 only checks that the process exists
        unsafe {
            libc::kill(pid as libc::pid_t, 0) == 0
                || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
        }
    }

    #[cfg(windows)]
    {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{
            OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                false
            } else {
                CloseHandle(handle);
                true
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        true
    }
}

/// Print the config file and log locations (for `--show-paths`).
pub fn print_all_paths() {
    let config = crate::config::PanelConfig::default_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unavailable>".to_string());

    println!("shell-panel paths:");
    println!();
    println!("Config:  {}", config);
    println!("Logs:    {}", log_dir().display());
    println!("  this run: {}", main_log_path().display());
}
