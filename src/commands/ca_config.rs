//! CA configuration command
//!
//! Resolves the operator's parameters (flags first, then prompts), applies the
//! settings with backup and a service restart, then enables CA auditing.

use crate::domain::{ApplyReport, CaSettingsPlan, CustomPeriodUnits, PeriodSetting};
use crate::error::AppResult;
use crate::infrastructure::{
    console, AuditpolPolicy, CertutilRegistry, PowerShellServiceControl, Prompter,
    CERTIFICATE_SERVICE, CERTIFICATION_SERVICES_CATEGORY,
};
use crate::logging::beside_executable;
use crate::reconcile::{
    AuditPolicy, BackupRecorder, ConfigurationReconciler, ServiceRestartHook, SettingRegistry,
    SettingsAppliedHook,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const CA_LOG_FILE: &str = "CAConfig.log";
pub const CA_BACKUP_FILE: &str = "CARegistryBackup.txt";

/// Options for a CA configuration run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaConfigOptions {
    /// Identifies the CA in backups and logs
    pub target: String,
    /// Operator supplies the four period units
    pub custom: bool,
    pub ds_config_dn: Option<String>,
    pub aia_fqdn: Option<String>,
    pub crl_period_units: Option<String>,
    pub crl_delta_period_units: Option<String>,
    pub crl_overlap_period_units: Option<String>,
    pub validity_period_units: Option<String>,
    /// Record current values before writing
    pub backup: bool,
    pub backup_path: PathBuf,
    /// Restart Certificate Services once settings are applied
    pub restart_service: bool,
    /// Enable success and failure auditing for Certification Services
    pub configure_audit: bool,
    pub timeout_secs: u64,
}

impl Default for CaConfigOptions {
    fn default() -> Self {
        Self {
            target: std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string()),
            custom: false,
            ds_config_dn: None,
            aia_fqdn: None,
            crl_period_units: None,
            crl_delta_period_units: None,
            crl_overlap_period_units: None,
            validity_period_units: None,
            backup: true,
            backup_path: beside_executable(CA_BACKUP_FILE),
            restart_service: true,
            configure_audit: true,
            timeout_secs: 120,
        }
    }
}

impl CaConfigOptions {
    /// Period unit passed on the command line, if any
    pub fn provided(&self, setting: PeriodSetting) -> Option<&str> {
        let value = match setting {
            PeriodSetting::CrlPeriodUnits => &self.crl_period_units,
            PeriodSetting::CrlDeltaPeriodUnits => &self.crl_delta_period_units,
            PeriodSetting::CrlOverlapPeriodUnits => &self.crl_overlap_period_units,
            PeriodSetting::ValidityPeriodUnits => &self.validity_period_units,
        };
        value.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fill unspecified values from the operator and validate the result.
///
/// Period units are only asked for in custom mode.
pub fn resolve_plan(
    options: &CaConfigOptions,
    prompter: &mut dyn Prompter,
) -> AppResult<CaSettingsPlan> {
    let ds_config_dn = match &options.ds_config_dn {
        Some(dn) => dn.clone(),
        None => prompter.prompt("DSConfigDN (e.g. CN=Configuration,DC=contoso,DC=com)", None)?,
    };
    let aia_fqdn = match &options.aia_fqdn {
        Some(fqdn) => fqdn.clone(),
        None => prompter.prompt("AIA/CDP host FQDN (e.g. pki.contoso.com)", None)?,
    };

    if !options.custom {
        return CaSettingsPlan::default_mode(&ds_config_dn, &aia_fqdn);
    }

    let mut custom = CustomPeriodUnits::default();
    for setting in PeriodSetting::all() {
        let value = match options.provided(*setting) {
            Some(v) => v.to_string(),
            None => prompter.prompt(&setting.prompt(), Some(setting.default_value()))?,
        };
        custom.set(*setting, value);
    }
    CaSettingsPlan::custom_mode(&ds_config_dn, &aia_fqdn, &custom)
}

/// Apply `plan` through `registry`, then enable Certification Services auditing.
///
/// Auditing is only touched once the backup is recorded and the settings were
/// written. An audit policy failure is reported as a warning.
pub fn run_ca_config<R: SettingRegistry>(
    options: &CaConfigOptions,
    plan: &CaSettingsPlan,
    registry: R,
    audit: &mut dyn AuditPolicy,
    hooks: Vec<Box<dyn SettingsAppliedHook>>,
) -> AppResult<ApplyReport> {
    tracing::info!(ca = %options.target, mode = ?plan.mode, "Configuring certificate authority");

    let mut reconciler = ConfigurationReconciler::for_certificate_authority(
        registry,
        BackupRecorder::new(&options.backup_path),
    );
    for hook in hooks {
        reconciler = reconciler.with_hook(hook);
    }

    let mut report =
        reconciler.apply(&options.target, &plan.desired_settings(), options.backup)?;

    if options.configure_audit {
        if let Err(e) = audit.set_auditing(CERTIFICATION_SERVICES_CATEGORY, true, true) {
            tracing::error!(error = %e, "Could not enable Certification Services auditing");
            report.add_warning(format!("Audit policy not set: {}", e));
        }
    }
    Ok(report)
}

/// Run against the local CA with the Windows tools
pub fn execute_ca_config(options: &CaConfigOptions) -> AppResult<ApplyReport> {
    let mut prompter = console();
    let plan = resolve_plan(options, &mut prompter)?;

    let mut hooks: Vec<Box<dyn SettingsAppliedHook>> = Vec::new();
    if options.restart_service {
        hooks.push(Box::new(ServiceRestartHook::new(
            PowerShellServiceControl::new(options.timeout()),
            CERTIFICATE_SERVICE,
        )));
    }

    let mut audit = AuditpolPolicy::new(options.timeout());
    run_ca_config(
        options,
        &plan,
        CertutilRegistry::new(options.timeout()),
        &mut audit,
        hooks,
    )
}

/// Operator-facing summary
pub fn render_apply_report(report: &ApplyReport) -> String {
    let mut out = format!("CA configuration for {}\n", report.target);
    match &report.backup_path {
        Some(path) => out.push_str(&format!("Backup: {}\n", path.display())),
        None => out.push_str("Backup: disabled\n"),
    }
    for result in &report.results {
        let status = if result.success { "OK    " } else { "FAILED" };
        out.push_str(&format!("  [{}] {} = {}\n", status, result.name, result.value));
        if !result.success {
            out.push_str(&format!("           {}\n", result.output.trim()));
        }
    }
    for warning in &report.warnings {
        out.push_str(&format!("Warning: {}\n", warning));
    }
    if let Some(verification) = &report.verification {
        out.push_str("Current CA settings:\n");
        out.push_str(verification.trim_end());
        out.push('\n');
    }
    out
}
