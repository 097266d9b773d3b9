use serde::Serialize;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cannot create backup location: {0}")]
    BackupError(String),

    #[error("Failed to apply setting {name}: {output}")]
    RegistryWriteError { name: String, output: String },

    #[error("Failed to read setting {name}: {message}")]
    RegistryReadError { name: String, message: String },

    #[error("No directory source has entries: {0}")]
    DirectorySourceUnavailable(String),

    #[error("Local store unavailable: {0}")]
    LocalStoreUnavailable(String),

    #[error("Local store error: {0}")]
    LocalStoreError(String),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidSettingValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to execute {program}: {message}")]
    ProcessError { program: String, message: String },

    #[error("{program} did not finish within {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Service control error: {0}")]
    ServiceControlError(String),

    #[error("Audit policy error: {0}")]
    AuditPolicyError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Serializable error for `--json` output
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl From<AppError> for CommandError {
    fn from(err: AppError) -> Self {
        CommandError {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let cmd_error = CommandError {
            code: self.error_code().to_string(),
            message: self.to_string(),
        };
        cmd_error.serialize(serializer)
    }
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::BackupError(_) => "BACKUP_ERROR",
            AppError::RegistryWriteError { .. } => "REGISTRY_WRITE_ERROR",
            AppError::RegistryReadError { .. } => "REGISTRY_READ_ERROR",
            AppError::DirectorySourceUnavailable(_) => "DIRECTORY_SOURCE_UNAVAILABLE",
            AppError::LocalStoreUnavailable(_) => "LOCAL_STORE_UNAVAILABLE",
            AppError::LocalStoreError(_) => "LOCAL_STORE_ERROR",
            AppError::InvalidSettingValue { .. } => "INVALID_SETTING_VALUE",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::ProcessError { .. } => "PROCESS_ERROR",
            AppError::Timeout { .. } => "TIMEOUT",
            AppError::Cancelled => "CANCELLED",
            AppError::ServiceControlError(_) => "SERVICE_CONTROL_ERROR",
            AppError::AuditPolicyError(_) => "AUDIT_POLICY_ERROR",
            AppError::IoError(_) => "IO_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the error aborts the whole run.
    ///
    /// Per-setting write failures are reported and the run continues; everything
    /// else stops the workflow where it is.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::RegistryWriteError { .. })
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::ConfigError(s)
    }
}

pub type AppResult<T> = Result<T, AppError>;
