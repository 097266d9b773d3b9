//! In-memory collaborators
//!
//! Stand-ins for the registry tool, directory and contact store, used by the
//! test suites and for exercising the reconcilers without Windows.

use crate::domain::{ContactFields, DirectoryEntry, LocalContact, MatchPolicy};
use crate::error::{AppError, AppResult};
use crate::reconcile::{DirectorySource, LocalStore, SettingRegistry, WriteOutcome};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

/// Call made against an [`InMemoryRegistry`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Read(String),
    Write(String, String),
    Dump,
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    values: BTreeMap<String, String>,
    failing: HashSet<String>,
    calls: RefCell<Vec<RegistryCall>>,
}

impl InMemoryRegistry {
    pub fn with_values(values: &[(&str, &str)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// Reject every write to `name`
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.borrow().clone()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                RegistryCall::Write(n, v) => Some((n.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }
}

impl SettingRegistry for InMemoryRegistry {
    fn read(&self, name: &str) -> AppResult<String> {
        self.calls.borrow_mut().push(RegistryCall::Read(name.to_string()));
        Ok(self.values.get(name).cloned().unwrap_or_default())
    }

    fn write(&mut self, name: &str, value: &str) -> AppResult<WriteOutcome> {
        self.calls
            .borrow_mut()
            .push(RegistryCall::Write(name.to_string(), value.to_string()));
        if self.failing.contains(name) {
            return Ok(WriteOutcome::failed(format!(
                "-setreg command FAILED for {}",
                name
            )));
        }
        self.values.insert(name.to_string(), value.to_string());
        Ok(WriteOutcome::ok("-setreg command completed successfully."))
    }

    fn dump(&self) -> AppResult<String> {
        self.calls.borrow_mut().push(RegistryCall::Dump);
        Ok(self
            .values
            .iter()
            .map(|(k, v)| format!("{} = {}\n", k, v))
            .collect())
    }
}

/// Fixed list of directory entries. `None` models an unreachable source.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    name: String,
    entries: Option<Vec<DirectoryEntry>>,
}

impl StaticDirectory {
    pub fn new(name: &str, entries: Vec<DirectoryEntry>) -> Self {
        Self {
            name: name.to_string(),
            entries: Some(entries),
        }
    }

    pub fn unavailable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: None,
        }
    }
}

impl DirectorySource for StaticDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> AppResult<Vec<DirectoryEntry>> {
        self.entries.clone().ok_or_else(|| {
            AppError::DirectorySourceUnavailable(format!("{} is not reachable", self.name))
        })
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryContactStore {
    available: bool,
    contacts: Vec<LocalContact>,
    next_id: usize,
    writes: usize,
}

impl Default for InMemoryContactStore {
    fn default() -> Self {
        Self {
            available: true,
            contacts: Vec::new(),
            next_id: 1,
            writes: 0,
        }
    }
}

impl InMemoryContactStore {
    pub fn with_contacts(contacts: Vec<ContactFields>) -> Self {
        let mut store = Self::default();
        for fields in contacts {
            let id = store.allocate_id();
            store.contacts.push(LocalContact { id, fields });
        }
        store
    }

    /// Store whose target collection does not exist
    pub fn missing() -> Self {
        Self {
            available: false,
            ..Default::default()
        }
    }

    fn allocate_id(&mut self) -> String {
        let id = format!("contact-{}", self.next_id);
        self.next_id += 1;
        id
    }

    pub fn contacts(&self) -> &[LocalContact] {
        &self.contacts
    }

    /// Number of create and update calls that reached the store
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl LocalStore for InMemoryContactStore {
    fn open(&mut self) -> AppResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(AppError::LocalStoreUnavailable("in-memory contacts folder".to_string()))
        }
    }

    fn find_by_email(&self, email: &str, policy: MatchPolicy) -> AppResult<Option<LocalContact>> {
        Ok(policy.select(&self.contacts, email).cloned())
    }

    fn create(&mut self, fields: &ContactFields) -> AppResult<LocalContact> {
        let contact = LocalContact {
            id: self.allocate_id(),
            fields: fields.clone(),
        };
        self.contacts.push(contact.clone());
        self.writes += 1;
        Ok(contact)
    }

    fn update(&mut self, contact: &LocalContact) -> AppResult<()> {
        let existing = self
            .contacts
            .iter_mut()
            .find(|c| c.id == contact.id)
            .ok_or_else(|| {
                AppError::LocalStoreError(format!("no contact with id {}", contact.id))
            })?;
        existing.fields = contact.fields.clone();
        self.writes += 1;
        Ok(())
    }
}
