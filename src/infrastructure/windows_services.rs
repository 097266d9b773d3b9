//! Service restart and audit policy helpers

use super::process::{ps_quote, run_powershell, run_with_timeout, DEFAULT_TIMEOUT};
use crate::error::{AppError, AppResult};
use crate::reconcile::{AuditPolicy, ServiceControl};
use std::time::Duration;

/// Certificate Services service name
pub const CERTIFICATE_SERVICE: &str = "certsvc";

/// auditpol subcategory covering CA events
pub const CERTIFICATION_SERVICES_CATEGORY: &str = "Certification Services";

/// Restarts services with `Restart-Service`
pub struct PowerShellServiceControl {
    timeout: Duration,
}

impl Default for PowerShellServiceControl {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl PowerShellServiceControl {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

pub fn restart_service_script(service: &str) -> String {
    format!(
        "Restart-Service -Name {} -Force -ErrorAction Stop",
        ps_quote(service)
    )
}

impl ServiceControl for PowerShellServiceControl {
    fn restart(&mut self, service: &str) -> AppResult<()> {
        let output = run_powershell(&restart_service_script(service), self.timeout)?;
        if output.success {
            Ok(())
        } else {
            Err(AppError::ServiceControlError(format!(
                "{}: {}",
                service,
                output.combined()
            )))
        }
    }
}

fn flag(enabled: bool) -> &'static str {
    if enabled {
        "enable"
    } else {
        "disable"
    }
}

pub fn auditpol_args(category: &str, success: bool, failure: bool) -> Vec<String> {
    vec![
        "/set".to_string(),
        format!("/subcategory:{}", category),
        format!("/success:{}", flag(success)),
        format!("/failure:{}", flag(failure)),
    ]
}

/// Sets audit policy with `auditpol /set`
pub struct AuditpolPolicy {
    timeout: Duration,
}

impl Default for AuditpolPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl AuditpolPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl AuditPolicy for AuditpolPolicy {
    fn set_auditing(&mut self, category: &str, success: bool, failure: bool) -> AppResult<()> {
        let args = auditpol_args(category, success, failure);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_with_timeout("auditpol", &args, self.timeout)?;
        if output.success {
            tracing::info!(category = %category, success, failure, "Audit policy set");
            Ok(())
        } else {
            Err(AppError::AuditPolicyError(format!(
                "{}: {}",
                category,
                output.combined()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auditpol_args() {
        assert_eq!(
            auditpol_args(CERTIFICATION_SERVICES_CATEGORY, true, false),
            vec![
                "/set",
                "/subcategory:Certification Services",
                "/success:enable",
                "/failure:disable",
            ]
        );
    }

    #[test]
    fn test_restart_script_quotes_service() {
        assert_eq!(
            restart_service_script(CERTIFICATE_SERVICE),
            "Restart-Service -Name 'certsvc' -Force -ErrorAction Stop"
        );
    }
}
