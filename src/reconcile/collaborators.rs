//! Interfaces to the external systems the reconcilers drive
//!
//! Reconciliation logic only talks to these traits. The Windows-backed
//! implementations live in `infrastructure`, in-memory ones in
//! `infrastructure::memory`.

use crate::domain::{ContactFields, DirectoryEntry, LocalContact, MatchPolicy};
use crate::error::AppResult;
use serde::{Deserialize, Serialize};

/// Result of writing one value through the registry tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub output: String,
}

impl WriteOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Key-value configuration store outside the process
pub trait SettingRegistry {
    /// Current value of `name` as the tool reports it.
    ///
    /// Returns `Err` only when the tool could not be run at all.
    fn read(&self, name: &str) -> AppResult<String>;

    /// Write `value` to `name`. A rejected write is `Ok` with `success == false`.
    fn write(&mut self, name: &str, value: &str) -> AppResult<WriteOutcome>;

    /// Read back the whole setting set for operator verification
    fn dump(&self) -> AppResult<String>;
}

/// Restarts an operating system service
pub trait ServiceControl {
    fn restart(&mut self, service: &str) -> AppResult<()>;
}

/// Enables auditing for an audit policy category
pub trait AuditPolicy {
    fn set_auditing(&mut self, category: &str, success: bool, failure: bool) -> AppResult<()>;
}

/// Enumerable external directory
pub trait DirectorySource {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Entries in the source's native enumeration order.
    ///
    /// An unreachable source is `Err`; a reachable one with no entries is `Ok(vec![])`.
    fn entries(&self) -> AppResult<Vec<DirectoryEntry>>;
}

/// Searchable, appendable contact collection
pub trait LocalStore {
    /// Resolve the target collection. Fails with `LocalStoreUnavailable`.
    fn open(&mut self) -> AppResult<()>;

    fn find_by_email(&self, email: &str, policy: MatchPolicy) -> AppResult<Option<LocalContact>>;

    /// Persist a new contact and return it with its store identifier
    fn create(&mut self, fields: &ContactFields) -> AppResult<LocalContact>;

    /// Persist the mapped fields of an existing contact
    fn update(&mut self, contact: &LocalContact) -> AppResult<()>;
}
