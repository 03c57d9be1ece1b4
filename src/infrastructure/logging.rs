// Logging setup - Console and optional per-run log file
use chrono::NaiveDateTime;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR: &str = "logs";

/// `logs/migration_<YYYYmmdd_HHMMSS>.log` for a run started at `started`.
pub fn log_file_path(dir: &Path, started: NaiveDateTime) -> PathBuf {
    dir.join(format!("migration_{}.log", started.format("%Y%m%d_%H%M%S")))
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `level`. Diagnostics go to stderr so console output stays readable.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let file = File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    if let Some(path) = log_file {
        tracing::info!(path = %path.display(), "Writing log file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_log_file_path() {
        let started = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap();
        assert_eq!(
            log_file_path(Path::new(LOG_DIR), started),
            PathBuf::from("logs/migration_20250304_050607.log")
        );
    }
}
