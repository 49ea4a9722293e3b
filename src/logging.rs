use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_BASENAME: &str = "camera-recorder.log";
const LOG_DIR_ENV: &str = "CAMERA_RECORDER_LOG_PATH";
const LOG_RETENTION: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Log to a daily rolling file and stderr (and os_log on macOS)
///
/// The returned guard must be kept alive for buffered file output to be
/// written out.
pub fn init_logging() -> Result<WorkerGuard> {
    let log_dir = log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;
    prune_old_logs(&log_dir, LOG_RETENTION);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_BASENAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Shows up in Console.app under the dev.camera-recorder.recorder subsystem
    #[cfg(target_os = "macos")]
    let oslog_layer = Some(tracing_oslog::OsLogger::new(
        "dev.camera-recorder.recorder",
        "default",
    ));
    #[cfg(not(target_os = "macos"))]
    let oslog_layer: Option<tracing_subscriber::layer::Identity> = None;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(oslog_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

/// Stderr-only logging, used when the log directory is unusable
pub fn init_stderr_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Directory holding the log files
pub fn log_dir() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(LOG_DIR_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .context("Failed to determine home directory for log path")?;
        Ok(home.join("Library").join("Logs").join("camera-recorder"))
    }

    #[cfg(not(target_os = "macos"))]
    {
        let proj_dirs = directories::ProjectDirs::from("dev", "camera-recorder", "recorder")
            .context("Failed to determine project directories for log path")?;
        // state_dir is only defined on Linux
        let base = proj_dirs
            .state_dir()
            .unwrap_or_else(|| proj_dirs.data_local_dir());
        Ok(base.join("logs"))
    }
}

/// Delete rotated log files last modified more than `max_age` ago
fn prune_old_logs(log_dir: &Path, max_age: Duration) {
    let (Ok(entries), Some(cutoff)) = (
        std::fs::read_dir(log_dir),
        SystemTime::now().checked_sub(max_age),
    ) else {
        return;
    };

    for entry in entries.flatten() {
        let is_log = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(LOG_FILE_BASENAME));
        let modified = entry.metadata().and_then(|m| m.modified());

        if let (true, Ok(modified)) = (is_log, modified) {
            if modified < cutoff && entry.path().is_file() {
                let _ = std::fs::remove_file(entry.path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_fresh_and_foreign_files() {
        let dir = std::env::temp_dir()
            .join("camera-recorder-tests")
            .join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();

        let fresh = dir.join(format!("{}.2026-10-18", LOG_FILE_BASENAME));
        let foreign = dir.join("other.log");
        std::fs::write(&fresh, b"x").unwrap();
        std::fs::write(&foreign, b"x").unwrap();

        prune_old_logs(&dir, Duration::from_secs(3600));
        assert!(fresh.exists());
        assert!(foreign.exists());

        // Both files are now older than the 1 ms cutoff
        std::thread::sleep(Duration::from_millis(20));
        prune_old_logs(&dir, Duration::from_millis(1));
        assert!(!fresh.exists());
        assert!(foreign.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
