//! Append-only backup of settings captured before mutation

use crate::domain::SettingsSnapshot;
use crate::error::{AppError, AppResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Writes snapshots to a text file, one `CA\<Name>=<value>` line per setting.
///
/// Runs accumulate in the same file; nothing is ever truncated.
#[derive(Debug, Clone)]
pub struct BackupRecorder {
    path: PathBuf,
}

impl BackupRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append `snapshot` to the backup file, creating its directory if needed.
    pub fn record(&self, snapshot: &SettingsSnapshot) -> AppResult<PathBuf> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                tracing::error!(
                    path = %parent.display(),
                    error = %e,
                    "Cannot create backup directory"
                );
                AppError::BackupError(format!("{}: {}", parent.display(), e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::BackupError(format!("{}: {}", self.path.display(), e)))?;

        let mut text = snapshot.header_line();
        text.push('\n');
        for line in snapshot.entry_lines() {
            text.push_str(&line);
            text.push('\n');
        }
        file.write_all(text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| AppError::BackupError(format!("{}: {}", self.path.display(), e)))?;

        tracing::info!(
            path = %self.path.display(),
            settings = snapshot.entries.len(),
            "Settings backed up"
        );
        Ok(self.path.clone())
    }
}
