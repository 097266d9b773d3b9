//! Directory and contact types for GAL synchronization

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an address list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    User,
    DistributionList,
    Resource,
    Other,
}

impl EntryKind {
    /// Map an Outlook `OlAddressEntryUserType` value.
    pub fn from_user_type_code(code: i64) -> Self {
        match code {
            0 | 5 => EntryKind::User,
            1 | 11 => EntryKind::DistributionList,
            2 | 3 | 4 => EntryKind::Resource,
            _ => EntryKind::Other,
        }
    }

    /// Only directory users are synced into the contact store
    pub fn is_directory_user(&self) -> bool {
        matches!(self, EntryKind::User)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::User => write!(f, "User"),
            EntryKind::DistributionList => write!(f, "DistributionList"),
            EntryKind::Resource => write!(f, "Resource"),
            EntryKind::Other => write!(f, "Other"),
        }
    }
}

/// Full user record behind a directory entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryUser {
    pub primary_smtp_address: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub company_name: String,
    pub business_telephone_number: String,
    pub mobile_telephone_number: String,
}

/// One address list entry. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub display_name: String,
    pub kind: EntryKind,
    /// Present when the entry resolved to a user record
    #[serde(default)]
    pub user: Option<DirectoryUser>,
}

impl DirectoryEntry {
    pub fn user(display_name: &str, user: DirectoryUser) -> Self {
        Self {
            display_name: display_name.to_string(),
            kind: EntryKind::User,
            user: Some(user),
        }
    }

    pub fn unresolved(display_name: &str, kind: EntryKind) -> Self {
        Self {
            display_name: display_name.to_string(),
            kind,
            user: None,
        }
    }

    /// Why this entry cannot be synced, if it cannot
    pub fn skip_reason(&self) -> Option<SkipReason> {
        if !self.kind.is_directory_user() {
            return Some(SkipReason::NotAUser(self.kind));
        }
        match &self.user {
            None => Some(SkipReason::Unresolvable),
            Some(u) if u.primary_smtp_address.trim().is_empty() => Some(SkipReason::NoEmailAddress),
            Some(_) => None,
        }
    }

    /// The resolved user record, when the entry is syncable
    pub fn resolve(&self) -> Option<&DirectoryUser> {
        match self.skip_reason() {
            None => self.user.as_ref(),
            Some(_) => None,
        }
    }
}

/// Why an entry was counted as skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NotAUser(EntryKind),
    Unresolvable,
    NoEmailAddress,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAUser(kind) => write!(f, "entry kind {} is not a directory user", kind),
            SkipReason::Unresolvable => write!(f, "entry did not resolve to a user record"),
            SkipReason::NoEmailAddress => write!(f, "user record has no primary email address"),
        }
    }
}

/// Fields copied from the directory into a local contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    pub company: String,
    pub business_phone: String,
    pub mobile_phone: String,
}

impl From<&DirectoryUser> for ContactFields {
    fn from(user: &DirectoryUser) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.primary_smtp_address.clone(),
            job_title: user.job_title.clone(),
            company: user.company_name.clone(),
            business_phone: user.business_telephone_number.clone(),
            mobile_phone: user.mobile_telephone_number.clone(),
        }
    }
}

impl ContactFields {
    /// Copy every mapped field except the email address, which is the match key.
    pub fn overwrite_except_email(&mut self, source: &ContactFields) {
        self.first_name = source.first_name.clone();
        self.last_name = source.last_name.clone();
        self.job_title = source.job_title.clone();
        self.company = source.company.clone();
        self.business_phone = source.business_phone.clone();
        self.mobile_phone = source.mobile_phone.clone();
    }
}

/// Contact in the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalContact {
    /// Store-assigned identifier (Outlook `EntryID`)
    pub id: String,
    #[serde(flatten)]
    pub fields: ContactFields,
}

/// How a match is picked when the store holds several contacts with one address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchPolicy {
    /// The first contact in store order wins; exact string equality on the address
    #[default]
    FirstMatch,
}

impl MatchPolicy {
    pub fn select<'a, I>(&self, contacts: I, email: &str) -> Option<&'a LocalContact>
    where
        I: IntoIterator<Item = &'a LocalContact>,
    {
        match self {
            MatchPolicy::FirstMatch => contacts.into_iter().find(|c| c.fields.email == email),
        }
    }
}

/// Which configured directory source supplied the entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    Primary,
    Secondary,
}

/// Entry that was not synced, with its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub display_name: String,
    pub reason: SkipReason,
}

/// Results from one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub source: String,
    pub role: SourceRole,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub skipped_entries: Vec<SkippedEntry>,
}

impl SyncReport {
    pub fn new(source: &str, role: SourceRole) -> Self {
        Self {
            source: source.to_string(),
            role,
            created: 0,
            updated: 0,
            skipped: 0,
            skipped_entries: Vec::new(),
        }
    }

    pub fn add_skipped(&mut self, display_name: &str, reason: SkipReason) {
        self.skipped += 1;
        self.skipped_entries.push(SkippedEntry {
            display_name: display_name.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> DirectoryUser {
        DirectoryUser {
            primary_smtp_address: "a@x.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Archer".to_string(),
            job_title: "Engineer".to_string(),
            company_name: "X".to_string(),
            business_telephone_number: "+1 555 0100".to_string(),
            mobile_telephone_number: "+1 555 0101".to_string(),
        }
    }

    #[test]
    fn test_entry_kind_from_user_type_code() {
        assert_eq!(EntryKind::from_user_type_code(0), EntryKind::User);
        assert_eq!(EntryKind::from_user_type_code(1), EntryKind::DistributionList);
        assert_eq!(EntryKind::from_user_type_code(2), EntryKind::Resource);
        assert_eq!(EntryKind::from_user_type_code(30), EntryKind::Other);
    }

    #[test]
    fn test_skip_reasons() {
        let room = DirectoryEntry::unresolved("Room 1", EntryKind::Resource);
        assert_eq!(room.skip_reason(), Some(SkipReason::NotAUser(EntryKind::Resource)));

        let placeholder = DirectoryEntry::unresolved("Ghost", EntryKind::User);
        assert_eq!(placeholder.skip_reason(), Some(SkipReason::Unresolvable));

        let mut no_mail = alice();
        no_mail.primary_smtp_address = "  ".to_string();
        let entry = DirectoryEntry::user("No Mail", no_mail);
        assert_eq!(entry.skip_reason(), Some(SkipReason::NoEmailAddress));
        assert!(entry.resolve().is_none());

        let ok = DirectoryEntry::user("Alice", alice());
        assert_eq!(ok.resolve(), Some(&alice()));
    }

    #[test]
    fn test_fields_copied_verbatim() {
        let fields = ContactFields::from(&alice());
        assert_eq!(fields.email, "a@x.com");
        assert_eq!(fields.company, "X");
        assert_eq!(fields.business_phone, "+1 555 0100");
    }

    #[test]
    fn test_overwrite_keeps_email() {
        let mut existing = ContactFields {
            email: "A@X.com".to_string(),
            job_title: "Intern".to_string(),
            ..Default::default()
        };
        existing.overwrite_except_email(&ContactFields::from(&alice()));
        assert_eq!(existing.email, "A@X.com");
        assert_eq!(existing.job_title, "Engineer");
        assert_eq!(existing.first_name, "Alice");
    }

    #[test]
    fn test_first_match_wins() {
        let contacts = vec![
            LocalContact {
                id: "1".to_string(),
                fields: ContactFields {
                    email: "b@x.com".to_string(),
                    ..Default::default()
                },
            },
            LocalContact {
                id: "2".to_string(),
                fields: ContactFields {
                    email: "a@x.com".to_string(),
                    ..Default::default()
                },
            },
            LocalContact {
                id: "3".to_string(),
                fields: ContactFields {
                    email: "a@x.com".to_string(),
                    ..Default::default()
                },
            },
        ];
        let found = MatchPolicy::FirstMatch.select(&contacts, "a@x.com").unwrap();
        assert_eq!(found.id, "2");
        assert!(MatchPolicy::FirstMatch.select(&contacts, "A@X.COM").is_none());
    }

    #[test]
    fn test_directory_entry_from_json() {
        let json = r#"{"displayName":"Alice","kind":"user","user":{"primarySmtpAddress":"a@x.com","firstName":"Alice"}}"#;
        let entry: DirectoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, EntryKind::User);
        let user = entry.resolve().unwrap();
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.job_title, "");
    }
}
