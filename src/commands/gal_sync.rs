//! GAL to Outlook contacts sync command

use crate::domain::SyncReport;
use crate::error::AppResult;
use crate::infrastructure::{OutlookAddressList, OutlookContacts};
use crate::reconcile::{CancelToken, DirectoryReconciler, DirectorySources, LocalStore};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GAL_LOG_FILE: &str = "GALSync.log";

/// Options for a GAL sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalSyncOptions {
    /// Per PowerShell call
    pub timeout_secs: u64,
    /// Stop between entries once the run has taken this long
    pub max_runtime_secs: Option<u64>,
    /// Fall back to the offline address list
    pub use_offline_fallback: bool,
}

impl Default for GalSyncOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_runtime_secs: None,
            use_offline_fallback: true,
        }
    }
}

impl GalSyncOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cancel_token(&self) -> CancelToken {
        match self.max_runtime_secs {
            Some(secs) => CancelToken::with_time_limit(Duration::from_secs(secs)),
            None => CancelToken::new(),
        }
    }
}

pub fn run_gal_sync(
    options: &GalSyncOptions,
    sources: &DirectorySources<'_>,
    store: &mut dyn LocalStore,
) -> AppResult<SyncReport> {
    let reconciler = DirectoryReconciler::new().with_cancel_token(options.cancel_token());
    tracing::info!(
        primary = %sources.primary.name(),
        policy = ?reconciler.match_policy(),
        "Starting GAL sync"
    );
    reconciler.sync(sources, store)
}

/// Run against the local Outlook profile
pub fn execute_gal_sync(options: &GalSyncOptions) -> AppResult<SyncReport> {
    let online = OutlookAddressList::global(options.timeout());
    let offline = OutlookAddressList::offline(options.timeout());
    let mut sources = DirectorySources::new(&online);
    if options.use_offline_fallback {
        sources = sources.with_fallback(&offline);
    }
    let mut contacts = OutlookContacts::new(options.timeout());
    run_gal_sync(options, &sources, &mut contacts)
}

pub fn render_sync_report(report: &SyncReport) -> String {
    let mut out = format!(
        "GAL sync from {} ({:?})\n  created: {}\n  updated: {}\n  skipped: {}\n",
        report.source, report.role, report.created, report.updated, report.skipped
    );
    for skipped in &report.skipped_entries {
        out.push_str(&format!("    - {}: {}\n", skipped.display_name, skipped.reason));
    }
    out
}
