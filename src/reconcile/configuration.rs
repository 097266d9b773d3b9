//! Apply a flat settings map with backup and read-back
//!
//! Flow: capture current values → back them up → write each setting →
//! read everything back for the operator → run `on_settings_applied` hooks.
//! Writes are best-effort: a rejected setting is reported and the rest still run.

use super::backup::BackupRecorder;
use super::collaborators::{ServiceControl, SettingRegistry, WriteOutcome};
use crate::domain::{fixed_settings, ApplyReport, SettingWriteResult, SettingsSnapshot};
use crate::error::{AppError, AppResult};

/// Invoked once after all settings were written and verified
pub trait SettingsAppliedHook {
    fn name(&self) -> &str;
    fn on_settings_applied(&mut self, report: &ApplyReport) -> AppResult<()>;
}

/// Restarts a service so it picks up the new settings
pub struct ServiceRestartHook<S: ServiceControl> {
    service_control: S,
    service: String,
}

impl<S: ServiceControl> ServiceRestartHook<S> {
    pub fn new(service_control: S, service: &str) -> Self {
        Self {
            service_control,
            service: service.to_string(),
        }
    }
}

impl<S: ServiceControl> SettingsAppliedHook for ServiceRestartHook<S> {
    fn name(&self) -> &str {
        "service restart"
    }

    fn on_settings_applied(&mut self, _report: &ApplyReport) -> AppResult<()> {
        tracing::info!(service = %self.service, "Restarting service");
        self.service_control.restart(&self.service)?;
        tracing::info!(service = %self.service, "Service restarted");
        Ok(())
    }
}

pub struct ConfigurationReconciler<R: SettingRegistry> {
    registry: R,
    recorder: BackupRecorder,
    fixed: Vec<(String, String)>,
    hooks: Vec<Box<dyn SettingsAppliedHook>>,
}

impl<R: SettingRegistry> ConfigurationReconciler<R> {
    /// Reconciler with no fixed settings
    pub fn new(registry: R, recorder: BackupRecorder) -> Self {
        Self {
            registry,
            recorder,
            fixed: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Reconciler that always applies the CA's fixed period units and audit filter
    pub fn for_certificate_authority(registry: R, recorder: BackupRecorder) -> Self {
        let mut reconciler = Self::new(registry, recorder);
        reconciler.fixed = fixed_settings();
        reconciler
    }

    pub fn with_hook(mut self, hook: Box<dyn SettingsAppliedHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn into_registry(self) -> R {
        self.registry
    }

    /// Desired settings followed by the fixed ones, in write order
    fn write_plan(&self, desired: &[(String, String)]) -> Vec<(String, String)> {
        desired.iter().chain(self.fixed.iter()).cloned().collect()
    }

    /// Read the current value of every setting about to be written.
    ///
    /// A setting listed twice is captured once, at its first position.
    fn capture(&self, target: &str, plan: &[(String, String)]) -> AppResult<SettingsSnapshot> {
        let mut entries: Vec<(String, String)> = Vec::with_capacity(plan.len());
        for (name, _) in plan {
            if entries.iter().any(|(n, _)| n == name) {
                continue;
            }
            let current = self.registry.read(name).map_err(|e| {
                AppError::BackupError(format!("could not read current value of {}: {}", name, e))
            })?;
            tracing::debug!(setting = %name, current = %current.trim(), "Captured current value");
            entries.push((name.clone(), current));
        }
        Ok(SettingsSnapshot::new(target, entries))
    }

    fn write_one(&mut self, name: &str, value: &str) -> SettingWriteResult {
        let outcome = match self.registry.write(name, value) {
            Ok(outcome) => outcome,
            Err(e) => WriteOutcome::failed(e.to_string()),
        };

        if outcome.success {
            tracing::info!(
                setting = %name,
                value = %value,
                output = %outcome.output.trim(),
                "Setting applied"
            );
        } else {
            let err = AppError::RegistryWriteError {
                name: name.to_string(),
                output: outcome.output.trim().to_string(),
            };
            tracing::error!(setting = %name, value = %value, error = %err, "Setting not applied");
        }

        SettingWriteResult {
            name: name.to_string(),
            value: value.to_string(),
            success: outcome.success,
            output: outcome.output,
        }
    }

    /// Apply `desired` (plus fixed settings) to `target`.
    ///
    /// With `do_backup`, nothing is written unless the backup was recorded.
    pub fn apply(
        &mut self,
        target: &str,
        desired: &[(String, String)],
        do_backup: bool,
    ) -> AppResult<ApplyReport> {
        let plan = self.write_plan(desired);
        let mut report = ApplyReport::new(target);

        tracing::info!(
            ca = %target,
            settings = plan.len(),
            backup = do_backup,
            "Applying settings"
        );

        if do_backup {
            let snapshot = self.capture(target, &plan)?;
            report.backup_path = Some(self.recorder.record(&snapshot)?);
        } else {
            tracing::warn!(ca = %target, "Backup disabled, previous values will not be recorded");
        }

        for (name, value) in &plan {
            let result = self.write_one(name, value);
            report.results.push(result);
        }

        match self.registry.dump() {
            Ok(values) => {
                tracing::info!(ca = %target, "Verification read:\n{}", values.trim_end());
                report.verification = Some(values);
            }
            Err(e) => {
                tracing::warn!(ca = %target, error = %e, "Verification read failed");
                report.add_warning(format!("Verification read failed: {}", e));
            }
        }

        let mut hook_warnings = Vec::new();
        for hook in self.hooks.iter_mut() {
            if let Err(e) = hook.on_settings_applied(&report) {
                tracing::error!(hook = %hook.name(), error = %e, "Post-apply step failed");
                hook_warnings.push(format!("{} failed: {}", hook.name(), e));
            }
        }
        for warning in hook_warnings {
            report.add_warning(warning);
        }

        let failed = report.failed().count();
        if failed == 0 {
            tracing::info!(ca = %target, applied = report.results.len(), "All settings applied");
        } else {
            tracing::warn!(
                ca = %target,
                failed,
                applied = report.results.len() - failed,
                "Some settings were not applied"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaSettingsPlan, CustomPeriodUnits};
    use crate::infrastructure::memory::{InMemoryRegistry, RegistryCall};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_backup_precedes_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.txt");
        let registry = InMemoryRegistry::with_values(&[("A", "old-a"), ("B", "old-b")]);
        let mut reconciler = ConfigurationReconciler::new(registry, BackupRecorder::new(&backup));

        let report = reconciler
            .apply("CA1", &pairs(&[("A", "new-a"), ("B", "new-b")]), true)
            .unwrap();
        assert_eq!(report.backup_path, Some(backup.clone()));

        let calls = reconciler.registry().calls();
        assert_eq!(
            calls,
            vec![
                RegistryCall::Read("A".to_string()),
                RegistryCall::Read("B".to_string()),
                RegistryCall::Write("A".to_string(), "new-a".to_string()),
                RegistryCall::Write("B".to_string(), "new-b".to_string()),
                RegistryCall::Dump,
            ]
        );

        let text = std::fs::read_to_string(&backup).unwrap();
        assert!(text.contains("CA\\A=old-a\n"));
        assert!(text.contains("CA\\B=old-b\n"));
    }

    /// Registry that checks the backup file already holds a line for each
    /// setting at the moment it is written.
    struct BackupCheckingRegistry {
        backup: PathBuf,
        seen_before_write: Rc<RefCell<Vec<bool>>>,
    }

    impl SettingRegistry for BackupCheckingRegistry {
        fn read(&self, name: &str) -> AppResult<String> {
            Ok(format!("{} old", name))
        }

        fn write(&mut self, name: &str, _value: &str) -> AppResult<WriteOutcome> {
            let text = std::fs::read_to_string(&self.backup).unwrap_or_default();
            let line = format!("CA\\{}={} old", name, name);
            self.seen_before_write.borrow_mut().push(text.contains(&line));
            Ok(WriteOutcome::ok("ok"))
        }

        fn dump(&self) -> AppResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_every_backup_line_exists_before_its_write() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("ca").join("backup.txt");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let registry = BackupCheckingRegistry {
            backup: backup.clone(),
            seen_before_write: Rc::clone(&seen),
        };
        let plan = CaSettingsPlan::default_mode("CN=Configuration,DC=x", "pki.x").unwrap();
        let mut reconciler = ConfigurationReconciler::for_certificate_authority(
            registry,
            BackupRecorder::new(&backup),
        );

        let report = reconciler.apply("CA1", &plan.desired_settings(), true).unwrap();

        assert_eq!(report.results.len(), 11);
        assert_eq!(seen.borrow().len(), 11);
        assert!(seen.borrow().iter().all(|s| *s));
    }

    #[test]
    fn test_backup_failure_blocks_all_writes() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let registry = InMemoryRegistry::with_values(&[("A", "old")]);
        let mut reconciler =
            ConfigurationReconciler::new(registry, BackupRecorder::new(blocker.join("backup.txt")));

        let err = reconciler.apply("CA1", &pairs(&[("A", "new")]), true).unwrap_err();

        assert_eq!(err.error_code(), "BACKUP_ERROR");
        let registry = reconciler.into_registry();
        assert!(registry.writes().is_empty());
        assert_eq!(registry.value("A"), Some("old".to_string()));
    }

    #[test]
    fn test_failed_write_does_not_stop_later_writes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = InMemoryRegistry::default().failing_on("CRLPeriodUnits");
        let custom = CustomPeriodUnits {
            crl_period_units: "10".to_string(),
            crl_delta_period_units: "0".to_string(),
            crl_overlap_period_units: "6".to_string(),
            validity_period_units: "10".to_string(),
        };
        let plan = CaSettingsPlan::custom_mode("CN=Configuration,DC=x", "pki.x", &custom).unwrap();
        let mut reconciler = ConfigurationReconciler::for_certificate_authority(
            registry,
            BackupRecorder::new(dir.path().join("backup.txt")),
        );

        let report = reconciler.apply("CA1", &plan.desired_settings(), true).unwrap();

        let failed: Vec<&str> = report.failed().map(|r| r.name.as_str()).collect();
        assert_eq!(failed, vec!["CRLPeriodUnits"]);
        for name in ["CRLDeltaPeriodUnits", "CRLOverlapPeriodUnits", "ValidityPeriodUnits"] {
            assert!(report.result_for(name).unwrap().success, "{} should be applied", name);
        }
        let registry = reconciler.into_registry();
        assert_eq!(registry.value("ValidityPeriodUnits"), Some("10".to_string()));
        assert_eq!(registry.value("CRLPeriodUnits"), None);
    }

    #[test]
    fn test_fixed_settings_follow_variable_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut reconciler = ConfigurationReconciler::for_certificate_authority(
            InMemoryRegistry::default(),
            BackupRecorder::new(dir.path().join("backup.txt")),
        );

        let report = reconciler.apply("CA1", &pairs(&[("DSConfigDN", "CN=x")]), false).unwrap();

        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["DSConfigDN", "CRLPeriod", "CRLOverlapPeriod", "ValidityPeriod", "AuditFilter"]
        );
        assert!(report.backup_path.is_none());
        assert!(!dir.path().join("backup.txt").exists());
    }

    #[test]
    fn test_verification_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut reconciler = ConfigurationReconciler::new(
            InMemoryRegistry::default(),
            BackupRecorder::new(dir.path().join("backup.txt")),
        );

        let report = reconciler.apply("CA1", &pairs(&[("A", "1")]), false).unwrap();

        assert_eq!(report.verification.as_deref(), Some("A = 1\n"));
    }

    struct CountingHook {
        calls: Rc<RefCell<usize>>,
        fail: bool,
    }

    impl SettingsAppliedHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_settings_applied(&mut self, report: &ApplyReport) -> AppResult<()> {
            assert!(report.verification.is_some());
            *self.calls.borrow_mut() += 1;
            if self.fail {
                return Err(AppError::ServiceControlError("service did not stop".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_hook_runs_once_and_failures_become_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(RefCell::new(0));
        let mut reconciler = ConfigurationReconciler::new(
            InMemoryRegistry::default(),
            BackupRecorder::new(dir.path().join("backup.txt")),
        )
        .with_hook(Box::new(CountingHook {
            calls: Rc::clone(&calls),
            fail: true,
        }));

        let report = reconciler.apply("CA1", &pairs(&[("A", "1")]), false).unwrap();

        assert_eq!(*calls.borrow(), 1);
        assert!(report.success());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("counting failed"));
    }

    struct RecordingService(Rc<RefCell<Vec<String>>>);

    impl ServiceControl for RecordingService {
        fn restart(&mut self, service: &str) -> AppResult<()> {
            self.0.borrow_mut().push(service.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_service_restart_hook_restarts_named_service() {
        let restarted = Rc::new(RefCell::new(Vec::new()));
        let mut hook = ServiceRestartHook::new(RecordingService(Rc::clone(&restarted)), "certsvc");
        hook.on_settings_applied(&ApplyReport::new("CA1")).unwrap();
        assert_eq!(*restarted.borrow(), vec!["certsvc".to_string()]);
    }
}
