//! Certificate Authority settings model
//!
//! Types describing the registry-backed CA settings, the two operating modes,
//! the backup snapshot and the per-setting apply report.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Registry node every CA setting lives under (`CA\<SettingName>`)
pub const CA_REGISTRY_NODE: &str = "CA";

/// Value written to `AuditFilter` to enable all CA audit events
pub const AUDIT_FILTER_ALL: &str = "127";

/// Qualify a setting name with the CA registry node.
pub fn registry_key(name: &str) -> String {
    format!("{}\\{}", CA_REGISTRY_NODE, name)
}

/// Time unit for a period setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodUnit {
    Hours,
    Days,
    Weeks,
    Years,
}

impl PeriodUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Hours => "Hours",
            PeriodUnit::Days => "Days",
            PeriodUnit::Weeks => "Weeks",
            PeriodUnit::Years => "Years",
        }
    }
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four numeric period settings an operator may override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodSetting {
    CrlPeriodUnits,
    CrlDeltaPeriodUnits,
    CrlOverlapPeriodUnits,
    ValidityPeriodUnits,
}

impl PeriodSetting {
    /// All period settings, in apply order
    pub fn all() -> &'static [PeriodSetting] {
        &[
            PeriodSetting::CrlPeriodUnits,
            PeriodSetting::CrlDeltaPeriodUnits,
            PeriodSetting::CrlOverlapPeriodUnits,
            PeriodSetting::ValidityPeriodUnits,
        ]
    }

    /// Registry value name
    pub fn name(&self) -> &'static str {
        match self {
            PeriodSetting::CrlPeriodUnits => "CRLPeriodUnits",
            PeriodSetting::CrlDeltaPeriodUnits => "CRLDeltaPeriodUnits",
            PeriodSetting::CrlOverlapPeriodUnits => "CRLOverlapPeriodUnits",
            PeriodSetting::ValidityPeriodUnits => "ValidityPeriodUnits",
        }
    }

    /// Value used in default mode
    pub fn default_value(&self) -> &'static str {
        match self {
            PeriodSetting::CrlPeriodUnits => "52",
            PeriodSetting::CrlDeltaPeriodUnits => "0",
            PeriodSetting::CrlOverlapPeriodUnits => "12",
            PeriodSetting::ValidityPeriodUnits => "5",
        }
    }

    /// Unit the value is counted in. Fixed regardless of mode.
    pub fn unit(&self) -> PeriodUnit {
        match self {
            PeriodSetting::CrlPeriodUnits => PeriodUnit::Weeks,
            PeriodSetting::CrlDeltaPeriodUnits => PeriodUnit::Days,
            PeriodSetting::CrlOverlapPeriodUnits => PeriodUnit::Hours,
            PeriodSetting::ValidityPeriodUnits => PeriodUnit::Years,
        }
    }

    /// Operator-facing prompt text
    pub fn prompt(&self) -> String {
        let what = match self {
            PeriodSetting::CrlPeriodUnits => "CRL publication period",
            PeriodSetting::CrlDeltaPeriodUnits => "Delta CRL period (0 disables delta CRLs)",
            PeriodSetting::CrlOverlapPeriodUnits => "CRL overlap period",
            PeriodSetting::ValidityPeriodUnits => "Issued certificate validity period",
        };
        format!("{} in {}", what, self.unit())
    }

    /// Only the delta CRL period may be zero.
    fn allows_zero(&self) -> bool {
        matches!(self, PeriodSetting::CrlDeltaPeriodUnits)
    }

    /// Validate an operator-supplied value.
    ///
    /// Values must be whole numbers; surrounding whitespace is trimmed.
    pub fn validate(&self, value: &str) -> AppResult<String> {
        let trimmed = value.trim();
        let invalid = |reason: &str| AppError::InvalidSettingValue {
            name: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let parsed: u32 = trimmed
            .parse()
            .map_err(|_| invalid("expected a whole number"))?;
        if parsed == 0 && !self.allows_zero() {
            return Err(invalid("must be greater than zero"));
        }
        Ok(parsed.to_string())
    }
}

impl fmt::Display for PeriodSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings applied unconditionally after the variable settings, in order.
pub fn fixed_settings() -> Vec<(String, String)> {
    vec![
        ("CRLPeriod".to_string(), PeriodUnit::Weeks.to_string()),
        ("CRLOverlapPeriod".to_string(), PeriodUnit::Hours.to_string()),
        ("ValidityPeriod".to_string(), PeriodUnit::Years.to_string()),
        ("AuditFilter".to_string(), AUDIT_FILTER_ALL.to_string()),
    ]
}

/// Operating mode selected at invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaSettingsMode {
    #[default]
    Default,
    Custom,
}

/// One variable setting: default, optional operator override and unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingSpec {
    pub name: String,
    pub default_value: String,
    pub override_value: Option<String>,
    pub unit: Option<PeriodUnit>,
}

impl SettingSpec {
    pub fn for_period(setting: PeriodSetting) -> Self {
        Self {
            name: setting.name().to_string(),
            default_value: setting.default_value().to_string(),
            override_value: None,
            unit: Some(setting.unit()),
        }
    }

    /// Override wins over default
    pub fn effective_value(&self) -> &str {
        self.override_value.as_deref().unwrap_or(&self.default_value)
    }
}

/// Raw custom-mode values as the operator typed them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPeriodUnits {
    pub crl_period_units: String,
    pub crl_delta_period_units: String,
    pub crl_overlap_period_units: String,
    pub validity_period_units: String,
}

impl CustomPeriodUnits {
    pub fn get(&self, setting: PeriodSetting) -> &str {
        match setting {
            PeriodSetting::CrlPeriodUnits => &self.crl_period_units,
            PeriodSetting::CrlDeltaPeriodUnits => &self.crl_delta_period_units,
            PeriodSetting::CrlOverlapPeriodUnits => &self.crl_overlap_period_units,
            PeriodSetting::ValidityPeriodUnits => &self.validity_period_units,
        }
    }

    pub fn set(&mut self, setting: PeriodSetting, value: String) {
        match setting {
            PeriodSetting::CrlPeriodUnits => self.crl_period_units = value,
            PeriodSetting::CrlDeltaPeriodUnits => self.crl_delta_period_units = value,
            PeriodSetting::CrlOverlapPeriodUnits => self.crl_overlap_period_units = value,
            PeriodSetting::ValidityPeriodUnits => self.validity_period_units = value,
        }
    }
}

/// AIA (CA certificate) publication URLs for the given host
pub fn ca_cert_publication_urls(aia_fqdn: &str) -> String {
    format!(
        r"1:C:\Windows\system32\CertSrv\CertEnroll\%1_%3%4.crt\n2:http://{}/CertEnroll/%1_%3%4.crt",
        aia_fqdn
    )
}

/// CDP (CRL) publication URLs for the given host
pub fn crl_publication_urls(aia_fqdn: &str) -> String {
    format!(
        r"1:C:\Windows\system32\CertSrv\CertEnroll\%3%8%9.crl\n2:http://{}/CertEnroll/%3%8%9.crl",
        aia_fqdn
    )
}

/// Fully resolved set of variable settings for one apply run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaSettingsPlan {
    pub mode: CaSettingsMode,
    pub ds_config_dn: String,
    pub aia_fqdn: String,
    pub period_units: Vec<SettingSpec>,
}

impl CaSettingsPlan {
    /// Default mode: the four period units take their fixed defaults
    pub fn default_mode(ds_config_dn: &str, aia_fqdn: &str) -> AppResult<Self> {
        Self::validate_common(ds_config_dn, aia_fqdn)?;
        Ok(Self {
            mode: CaSettingsMode::Default,
            ds_config_dn: ds_config_dn.trim().to_string(),
            aia_fqdn: aia_fqdn.trim().to_string(),
            period_units: PeriodSetting::all()
                .iter()
                .map(|s| SettingSpec::for_period(*s))
                .collect(),
        })
    }

    /// Custom mode: every period unit comes from the operator and is validated
    pub fn custom_mode(
        ds_config_dn: &str,
        aia_fqdn: &str,
        custom: &CustomPeriodUnits,
    ) -> AppResult<Self> {
        Self::validate_common(ds_config_dn, aia_fqdn)?;
        let mut period_units = Vec::with_capacity(PeriodSetting::all().len());
        for setting in PeriodSetting::all() {
            let mut spec = SettingSpec::for_period(*setting);
            spec.override_value = Some(setting.validate(custom.get(*setting))?);
            period_units.push(spec);
        }
        Ok(Self {
            mode: CaSettingsMode::Custom,
            ds_config_dn: ds_config_dn.trim().to_string(),
            aia_fqdn: aia_fqdn.trim().to_string(),
            period_units,
        })
    }

    fn validate_common(ds_config_dn: &str, aia_fqdn: &str) -> AppResult<()> {
        if ds_config_dn.trim().is_empty() {
            return Err(AppError::InvalidSettingValue {
                name: "DSConfigDN".to_string(),
                value: ds_config_dn.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let fqdn = aia_fqdn.trim();
        if fqdn.is_empty() || fqdn.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(AppError::InvalidSettingValue {
                name: "AIA FQDN".to_string(),
                value: aia_fqdn.to_string(),
                reason: "expected a host name such as pki.contoso.com".to_string(),
            });
        }
        Ok(())
    }

    /// Ordered variable settings: directory DN, publication URLs, then period units
    pub fn desired_settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            ("DSConfigDN".to_string(), self.ds_config_dn.clone()),
            (
                "CACertPublicationURLs".to_string(),
                ca_cert_publication_urls(&self.aia_fqdn),
            ),
            (
                "CRLPublicationURLs".to_string(),
                crl_publication_urls(&self.aia_fqdn),
            ),
        ];
        settings.extend(
            self.period_units
                .iter()
                .map(|s| (s.name.clone(), s.effective_value().to_string())),
        );
        settings
    }
}

/// Values captured immediately before mutation. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub target: String,
    pub taken_at: DateTime<Utc>,
    pub entries: Vec<(String, String)>,
}

impl SettingsSnapshot {
    pub fn new(target: &str, entries: Vec<(String, String)>) -> Self {
        Self {
            target: target.to_string(),
            taken_at: Utc::now(),
            entries,
        }
    }

    /// Header line identifying the snapshot within an append-only backup file
    pub fn header_line(&self) -> String {
        format!(
            "# snapshot {} target={}",
            self.taken_at.to_rfc3339(),
            self.target
        )
    }

    /// One `CA\<SettingName>=<raw output>` line per entry
    pub fn entry_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, value)| format!("{}={}", registry_key(name), escape_line_breaks(value)))
            .collect()
    }
}

/// Keep multi-line tool output on a single backup line.
fn escape_line_breaks(value: &str) -> String {
    value
        .trim_end()
        .replace("\r\n", "\\n")
        .replace(['\r', '\n'], "\\n")
}

/// Multi-setting application policy. The registry tool has no transaction
/// primitive, so there is only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplyMode {
    #[default]
    BestEffort,
}

/// Outcome of a single setting write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingWriteResult {
    pub name: String,
    pub value: String,
    pub success: bool,
    pub output: String,
}

/// Results from one apply run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub target: String,
    pub mode: ApplyMode,
    pub backup_path: Option<PathBuf>,
    pub results: Vec<SettingWriteResult>,
    pub verification: Option<String>,
    pub warnings: Vec<String>,
}

impl ApplyReport {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            mode: ApplyMode::BestEffort,
            backup_path: None,
            results: Vec::new(),
            verification: None,
            warnings: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// True when every write succeeded
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &SettingWriteResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn result_for(&self, name: &str) -> Option<&SettingWriteResult> {
        self.results.iter().find(|r| r.name == name)
    }
}
