//! Operator-facing log files
//!
//! Two files live next to the snapshots of a server:
//!
//! - `channel_changes.log` (or `channel_changes_<year>.log`): appended once
//!   per cycle that found changes, with the detailed report
//! - `last_activity.log`: overwritten every cycle with that cycle's outcome

use chrono::{DateTime, Datelike, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

const CHANGE_LOG_STEM: &str = "channel_changes";
const LAST_ACTIVITY_FILE: &str = "last_activity.log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writer for the change log and the last-activity file
#[derive(Debug, Clone)]
pub struct ActivityLog {
    dir: PathBuf,
    per_year: bool,
}

impl ActivityLog {
    /// # Parameters
    ///
    /// - `dir`: Directory of the monitored server
    /// - `per_year`: Start a new change log every calendar year
    pub fn new(dir: impl Into<PathBuf>, per_year: bool) -> Self {
        Self {
            dir: dir.into(),
            per_year,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Change log file for the given time
    pub fn change_log_path(&self, now: &DateTime<Local>) -> PathBuf {
        if self.per_year {
            self.dir
                .join(format!("{}_{}.log", CHANGE_LOG_STEM, now.year()))
        } else {
            self.dir.join(format!("{}.log", CHANGE_LOG_STEM))
        }
    }

    pub fn last_activity_path(&self) -> PathBuf {
        self.dir.join(LAST_ACTIVITY_FILE)
    }

    /// Append a timestamped report to the change log
    pub async fn append_changes(&self, now: &DateTime<Local>, report: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.change_log_path(now);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                Error::Other(format!("Failed to open change log {}: {}", path.display(), e))
            })?;

        let entry = format!(
            "==================== {} ====================\n{}\n",
            now.format(TIMESTAMP_FORMAT),
            report.trim_end()
        );
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!("Appended changes to {}", path.display());
        Ok(())
    }

    /// Replace the last-activity file with this cycle's outcome
    pub async fn write_last_activity(&self, now: &DateTime<Local>, outcome: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let content = format!("Last check: {}\n{}\n", now.format(TIMESTAMP_FORMAT), outcome.trim_end());
        fs::write(self.last_activity_path(), content).await?;
        Ok(())
    }
}
