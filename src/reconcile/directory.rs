//! One-way sync of directory users into a local contact store
//!
//! `Start → ResolveSource{Primary|Secondary} → ResolveLocalStore → Iterate → Done`.
//! Contacts are created or updated, matched by primary email address, and never
//! deleted. There is no rollback: an abort keeps the writes already made.

use super::cancel::CancelToken;
use super::collaborators::{DirectorySource, LocalStore};
use crate::domain::{ContactFields, DirectoryEntry, MatchPolicy, SourceRole, SyncReport};
use crate::error::{AppError, AppResult};

/// Primary directory with an optional fallback
pub struct DirectorySources<'a> {
    pub primary: &'a dyn DirectorySource,
    pub secondary: Option<&'a dyn DirectorySource>,
}

impl<'a> DirectorySources<'a> {
    pub fn new(primary: &'a dyn DirectorySource) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_fallback(mut self, secondary: &'a dyn DirectorySource) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// First source, in order, that is reachable and has entries
    pub fn resolve(&self) -> AppResult<(&'a dyn DirectorySource, SourceRole, Vec<DirectoryEntry>)> {
        let mut problems = Vec::new();
        let candidates = std::iter::once((self.primary, SourceRole::Primary))
            .chain(self.secondary.map(|s| (s, SourceRole::Secondary)));

        for (source, role) in candidates {
            match source.entries() {
                Ok(entries) if !entries.is_empty() => {
                    tracing::info!(
                        source = %source.name(),
                        ?role,
                        entries = entries.len(),
                        "Directory source resolved"
                    );
                    return Ok((source, role, entries));
                }
                Ok(_) => {
                    tracing::warn!(
                        source = %source.name(),
                        ?role,
                        "Directory source has no entries"
                    );
                    problems.push(format!("{} is empty", source.name()));
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source.name(),
                        ?role,
                        error = %e,
                        "Directory source unavailable"
                    );
                    problems.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        Err(AppError::DirectorySourceUnavailable(problems.join("; ")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryReconciler {
    policy: MatchPolicy,
    cancel: CancelToken,
}

impl DirectoryReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn match_policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Bring `store` in line with the first usable directory source.
    pub fn sync(
        &self,
        sources: &DirectorySources<'_>,
        store: &mut dyn LocalStore,
    ) -> AppResult<SyncReport> {
        let (source, role, entries) = sources.resolve()?;

        store.open().map_err(|e| match e {
            AppError::LocalStoreUnavailable(_) => e,
            other => AppError::LocalStoreUnavailable(other.to_string()),
        })?;

        let mut report = SyncReport::new(source.name(), role);

        for entry in &entries {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    created = report.created,
                    updated = report.updated,
                    skipped = report.skipped,
                    "Sync cancelled"
                );
                return Err(AppError::Cancelled);
            }
            self.sync_entry(entry, store, &mut report)?;
        }

        tracing::info!(
            source = %report.source,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "Directory sync complete"
        );
        Ok(report)
    }

    fn sync_entry(
        &self,
        entry: &DirectoryEntry,
        store: &mut dyn LocalStore,
        report: &mut SyncReport,
    ) -> AppResult<()> {
        let user = match entry.resolve() {
            Some(user) => user,
            None => {
                if let Some(reason) = entry.skip_reason() {
                    tracing::debug!(entry = %entry.display_name, %reason, "Skipping entry");
                    report.add_skipped(&entry.display_name, reason);
                }
                return Ok(());
            }
        };

        let fields = ContactFields::from(user);
        match store.find_by_email(&fields.email, self.policy)? {
            None => {
                let created = store.create(&fields)?;
                tracing::info!(email = %fields.email, id = %created.id, "Contact created");
                report.created += 1;
            }
            Some(mut existing) => {
                existing.fields.overwrite_except_email(&fields);
                store.update(&existing)?;
                tracing::info!(
                    email = %existing.fields.email,
                    id = %existing.id,
                    "Contact updated"
                );
                report.updated += 1;
            }
        }
        Ok(())
    }
}
