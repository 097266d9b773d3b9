//! Outlook address lists and contacts through PowerShell COM automation
//!
//! Each operation runs a short PowerShell script against `Outlook.Application`
//! and exchanges data as JSON.

use super::process::{ps_quote, run_powershell, DEFAULT_TIMEOUT};
use crate::domain::{
    ContactFields, DirectoryEntry, DirectoryUser, EntryKind, LocalContact, MatchPolicy,
};
use crate::error::{AppError, AppResult};
use crate::reconcile::{DirectorySource, LocalStore};
use serde::Deserialize;
use std::time::Duration;

/// Online address list name
pub const GLOBAL_ADDRESS_LIST: &str = "Global Address List";

/// Cached address list used when the online one is unavailable
pub const OFFLINE_GLOBAL_ADDRESS_LIST: &str = "Offline Global Address List";

/// Redirected output is UTF-8 so non-ASCII names survive the round trip.
const SESSION_PRELUDE: &str = r#"
$ErrorActionPreference = 'Stop'
[Console]::OutputEncoding = [System.Text.Encoding]::UTF8
$outlook = New-Object -ComObject Outlook.Application
$session = $outlook.GetNamespace('MAPI')
"#;

/// Address list entry as emitted by [`address_list_script`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAddressEntry {
    #[serde(default)]
    display_name: String,
    user_type: i64,
    #[serde(default)]
    user: Option<DirectoryUser>,
}

impl From<RawAddressEntry> for DirectoryEntry {
    fn from(raw: RawAddressEntry) -> Self {
        DirectoryEntry {
            display_name: raw.display_name,
            kind: EntryKind::from_user_type_code(raw.user_type),
            user: raw.user,
        }
    }
}

/// Script listing every entry of `list_name`, resolving Exchange users.
pub fn address_list_script(list_name: &str) -> String {
    format!(
        r#"{prelude}
$list = $session.AddressLists | Where-Object {{ $_.Name -eq {list} }} | Select-Object -First 1
if (-not $list) {{ [Console]::Error.WriteLine('Address list not found'); exit 2 }}
$entries = @()
foreach ($entry in $list.AddressEntries) {{
    $item = [ordered]@{{
        displayName = [string]$entry.Name
        userType = [int]$entry.AddressEntryUserType
        user = $null
    }}
    if ($item.userType -eq 0 -or $item.userType -eq 5) {{
        $u = $entry.GetExchangeUser()
        if ($u) {{
            $item.user = [ordered]@{{
                primarySmtpAddress = [string]$u.PrimarySmtpAddress
                firstName = [string]$u.FirstName
                lastName = [string]$u.LastName
                jobTitle = [string]$u.JobTitle
                companyName = [string]$u.CompanyName
                businessTelephoneNumber = [string]$u.BusinessTelephoneNumber
                mobileTelephoneNumber = [string]$u.MobileTelephoneNumber
            }}
        }}
    }}
    $entries += [pscustomobject]$item
}}
ConvertTo-Json -InputObject @($entries) -Depth 4 -Compress
"#,
        prelude = SESSION_PRELUDE,
        list = ps_quote(list_name),
    )
}

/// Parse JSON array output; empty output means an empty list.
fn parse_json_list<T: for<'de> Deserialize<'de>>(stdout: &str) -> AppResult<Vec<T>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

pub fn parse_address_list(stdout: &str) -> AppResult<Vec<DirectoryEntry>> {
    let raw: Vec<RawAddressEntry> = parse_json_list(stdout)?;
    Ok(raw.into_iter().map(DirectoryEntry::from).collect())
}

/// One named Outlook address list
pub struct OutlookAddressList {
    list_name: String,
    timeout: Duration,
}

impl OutlookAddressList {
    pub fn new(list_name: &str, timeout: Duration) -> Self {
        Self {
            list_name: list_name.to_string(),
            timeout,
        }
    }

    pub fn global(timeout: Duration) -> Self {
        Self::new(GLOBAL_ADDRESS_LIST, timeout)
    }

    pub fn offline(timeout: Duration) -> Self {
        Self::new(OFFLINE_GLOBAL_ADDRESS_LIST, timeout)
    }
}

impl DirectorySource for OutlookAddressList {
    fn name(&self) -> &str {
        &self.list_name
    }

    fn entries(&self) -> AppResult<Vec<DirectoryEntry>> {
        let output = run_powershell(&address_list_script(&self.list_name), self.timeout)?;
        if !output.success {
            return Err(AppError::DirectorySourceUnavailable(format!(
                "{}: {}",
                self.list_name,
                output.combined()
            )));
        }
        let entries = parse_address_list(&output.stdout)?;
        tracing::debug!(list = %self.list_name, entries = entries.len(), "Address list read");
        Ok(entries)
    }
}

/// `$contact.<Property> = '<value>'` lines for the mapped fields
fn field_assignments(fields: &ContactFields, include_email: bool) -> String {
    let mut lines = vec![
        format!("$contact.FirstName = {}", ps_quote(&fields.first_name)),
        format!("$contact.LastName = {}", ps_quote(&fields.last_name)),
        format!("$contact.JobTitle = {}", ps_quote(&fields.job_title)),
        format!("$contact.CompanyName = {}", ps_quote(&fields.company)),
        format!("$contact.BusinessTelephoneNumber = {}", ps_quote(&fields.business_phone)),
        format!("$contact.MobileTelephoneNumber = {}", ps_quote(&fields.mobile_phone)),
    ];
    if include_email {
        lines.insert(2, format!("$contact.Email1Address = {}", ps_quote(&fields.email)));
    }
    lines.join("\n")
}

/// Script dumping every contact item of the default Contacts folder
pub fn load_contacts_script() -> String {
    format!(
        r#"{prelude}
$folder = $session.GetDefaultFolder(10)
if (-not $folder) {{ [Console]::Error.WriteLine('Contacts folder not found'); exit 2 }}
$contacts = @()
foreach ($item in $folder.Items) {{
    if ($item.Class -ne 40) {{ continue }}
    $contacts += [pscustomobject][ordered]@{{
        id = [string]$item.EntryID
        firstName = [string]$item.FirstName
        lastName = [string]$item.LastName
        email = [string]$item.Email1Address
        jobTitle = [string]$item.JobTitle
        company = [string]$item.CompanyName
        businessPhone = [string]$item.BusinessTelephoneNumber
        mobilePhone = [string]$item.MobileTelephoneNumber
    }}
}}
ConvertTo-Json -InputObject @($contacts) -Depth 3 -Compress
"#,
        prelude = SESSION_PRELUDE,
    )
}

/// Script creating a contact and printing its EntryID
pub fn create_contact_script(fields: &ContactFields) -> String {
    format!(
        r#"{prelude}
$folder = $session.GetDefaultFolder(10)
$contact = $folder.Items.Add(2)
{assignments}
$contact.Save()
$contact.EntryID
"#,
        prelude = SESSION_PRELUDE,
        assignments = field_assignments(fields, true),
    )
}

/// Script overwriting every mapped field except the email address
pub fn update_contact_script(contact: &LocalContact) -> String {
    format!(
        r#"{prelude}
$contact = $session.GetItemFromID({id})
{assignments}
$contact.Save()
"#,
        prelude = SESSION_PRELUDE,
        id = ps_quote(&contact.id),
        assignments = field_assignments(&contact.fields, false),
    )
}

/// Default Outlook Contacts folder.
///
/// The folder is read once on `open`; lookups are served from that copy, which
/// is kept current with every create and update made through this store.
pub struct OutlookContacts {
    timeout: Duration,
    contacts: Vec<LocalContact>,
}

impl Default for OutlookContacts {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl OutlookContacts {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            contacts: Vec::new(),
        }
    }
}

impl LocalStore for OutlookContacts {
    fn open(&mut self) -> AppResult<()> {
        let output = run_powershell(&load_contacts_script(), self.timeout)?;
        if !output.success {
            return Err(AppError::LocalStoreUnavailable(output.combined()));
        }
        self.contacts = parse_json_list(&output.stdout)?;
        tracing::info!(contacts = self.contacts.len(), "Contacts folder loaded");
        Ok(())
    }

    fn find_by_email(&self, email: &str, policy: MatchPolicy) -> AppResult<Option<LocalContact>> {
        Ok(policy.select(&self.contacts, email).cloned())
    }

    fn create(&mut self, fields: &ContactFields) -> AppResult<LocalContact> {
        let output = run_powershell(&create_contact_script(fields), self.timeout)?;
        if !output.success {
            return Err(AppError::LocalStoreError(format!(
                "could not create contact {}: {}",
                fields.email,
                output.combined()
            )));
        }
        let contact = LocalContact {
            id: output.stdout.trim().to_string(),
            fields: fields.clone(),
        };
        self.contacts.push(contact.clone());
        Ok(contact)
    }

    fn update(&mut self, contact: &LocalContact) -> AppResult<()> {
        let output = run_powershell(&update_contact_script(contact), self.timeout)?;
        if !output.success {
            return Err(AppError::LocalStoreError(format!(
                "could not update contact {}: {}",
                contact.fields.email,
                output.combined()
            )));
        }
        if let Some(cached) = self.contacts.iter_mut().find(|c| c.id == contact.id) {
            cached.fields = contact.fields.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_list() {
        let stdout = r#"[{"displayName":"Alice Archer","userType":0,"user":{"primarySmtpAddress":"a@x.com","firstName":"Alice","lastName":"Archer","jobTitle":"Engineer","companyName":"X","businessTelephoneNumber":"","mobileTelephoneNumber":""}},{"displayName":"Sales","userType":1,"user":null}]"#;
        let entries = parse_address_list(stdout).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::User);
        assert_eq!(entries[0].resolve().unwrap().primary_smtp_address, "a@x.com");
        assert_eq!(entries[1].kind, EntryKind::DistributionList);
        assert!(entries[1].user.is_none());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_address_list("").unwrap().is_empty());
        assert!(parse_address_list("[]\r\n").unwrap().is_empty());
        assert!(parse_address_list("not json").is_err());
    }

    #[test]
    fn test_parse_contacts() {
        let stdout = r#"[{"id":"0000ABCD","firstName":"Alice","lastName":"Archer","email":"a@x.com","jobTitle":"","company":"X","businessPhone":"","mobilePhone":""}]"#;
        let contacts: Vec<LocalContact> = parse_json_list(stdout).unwrap();
        assert_eq!(contacts[0].id, "0000ABCD");
        assert_eq!(contacts[0].fields.email, "a@x.com");
        assert_eq!(contacts[0].fields.company, "X");
    }

    #[test]
    fn test_address_list_script_quotes_name() {
        let script = address_list_script("Bob's List");
        assert!(script.contains("$_.Name -eq 'Bob''s List'"));
        assert!(script.contains("GetExchangeUser()"));
    }

    #[test]
    fn test_update_script_never_touches_email() {
        let contact = LocalContact {
            id: "00AB".to_string(),
            fields: ContactFields {
                first_name: "Seán".to_string(),
                last_name: "O'Neill".to_string(),
                email: "s@x.com".to_string(),
                ..Default::default()
            },
        };
        let script = update_contact_script(&contact);
        assert!(script.contains("GetItemFromID('00AB')"));
        assert!(script.contains("$contact.LastName = 'O''Neill'"));
        assert!(!script.contains("Email1Address"));

        let create = create_contact_script(&contact.fields);
        assert!(create.contains("$contact.FirstName = 'Seán'"));
        assert!(create.contains("$contact.Email1Address = 's@x.com'"));
        assert!(create.contains("$folder.Items.Add(2)"));
    }

    #[test]
    fn test_every_script_emits_utf8() {
        let utf8 = "[Console]::OutputEncoding = [System.Text.Encoding]::UTF8";
        let contact = LocalContact {
            id: "00AB".to_string(),
            fields: ContactFields::default(),
        };
        for script in [
            address_list_script(GLOBAL_ADDRESS_LIST),
            load_contacts_script(),
            create_contact_script(&contact.fields),
            update_contact_script(&contact),
        ] {
            let encoding = script.find(utf8).unwrap();
            assert!(encoding < script.find("New-Object -ComObject").unwrap());
        }
    }

    #[test]
    fn test_parse_keeps_non_ascii_names() {
        let stdout = "[{\"displayName\":\"Seán Ó Briain\",\"userType\":0,\"user\":\
            {\"primarySmtpAddress\":\"s@x.com\",\"firstName\":\"Seán\",\
            \"lastName\":\"Ó Briain\"}}]";
        let entries = parse_address_list(stdout).unwrap();
        let fields = ContactFields::from(entries[0].resolve().unwrap());
        assert_eq!(fields.first_name, "Seán");
        assert_eq!(fields.last_name, "Ó Briain");
    }
}
