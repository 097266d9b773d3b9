//! CA registry access through `certutil -getreg` / `-setreg`

use super::process::{run_with_timeout, ProcessOutput, DEFAULT_TIMEOUT};
use crate::domain::{registry_key, CA_REGISTRY_NODE};
use crate::error::{AppError, AppResult};
use crate::reconcile::{SettingRegistry, WriteOutcome};
use std::time::Duration;

pub fn getreg_args(name: &str) -> Vec<String> {
    vec!["-getreg".to_string(), registry_key(name)]
}

pub fn setreg_args(name: &str, value: &str) -> Vec<String> {
    vec!["-setreg".to_string(), registry_key(name), value.to_string()]
}

/// certutil reports failure in its output even on some zero exit codes
fn setreg_succeeded(output: &ProcessOutput) -> bool {
    output.success && !output.combined().contains("FAILED")
}

pub struct CertutilRegistry {
    program: String,
    timeout: Duration,
}

impl Default for CertutilRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl CertutilRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "certutil".to_string(),
            timeout,
        }
    }

    fn run(&self, args: &[String]) -> AppResult<ProcessOutput> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_with_timeout(&self.program, &args, self.timeout)
    }
}

impl SettingRegistry for CertutilRegistry {
    /// Raw `-getreg` output; a missing value yields certutil's own error text.
    fn read(&self, name: &str) -> AppResult<String> {
        let output = self.run(&getreg_args(name))?;
        Ok(output.combined())
    }

    fn write(&mut self, name: &str, value: &str) -> AppResult<WriteOutcome> {
        let output = self.run(&setreg_args(name, value))?;
        let text = output.combined();
        if setreg_succeeded(&output) {
            Ok(WriteOutcome::ok(text))
        } else {
            Ok(WriteOutcome::failed(text))
        }
    }

    fn dump(&self) -> AppResult<String> {
        let output = self.run(&["-getreg".to_string(), CA_REGISTRY_NODE.to_string()])?;
        if !output.success {
            return Err(AppError::RegistryReadError {
                name: CA_REGISTRY_NODE.to_string(),
                message: output.combined(),
            });
        }
        Ok(output.stdout)
    }
}
