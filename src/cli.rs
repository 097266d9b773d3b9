use crate::commands::{CaConfigOptions, GalSyncOptions, CA_BACKUP_FILE, CA_LOG_FILE, GAL_LOG_FILE};
use crate::logging::beside_executable;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "admin-reconcile", version)]
#[command(about = "Root CA registry configuration and GAL to Outlook contact sync")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Back up, apply and verify the CA registry settings
    CaConfig(CaConfigArgs),
    /// Create or update Outlook contacts from the Global Address List
    GalSync(GalSyncArgs),
}

/// Flags shared by both commands
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Log at debug level
    #[arg(long)]
    pub verbose: bool,
    /// Log file (defaults to beside the executable)
    #[arg(long = "log-path")]
    pub log_path: Option<PathBuf>,
    /// Per external command timeout in seconds
    #[arg(long = "timeout-secs", default_value_t = 120)]
    pub timeout_secs: u64,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CaConfigArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Supply the four period units instead of the defaults
    #[arg(long)]
    pub custom: bool,
    #[arg(long = "ds-config-dn")]
    pub ds_config_dn: Option<String>,
    /// Host used in the AIA and CDP URLs
    #[arg(long = "aia-fqdn")]
    pub aia_fqdn: Option<String>,
    #[arg(long = "crl-period-units", requires = "custom")]
    pub crl_period_units: Option<String>,
    #[arg(long = "crl-delta-period-units", requires = "custom")]
    pub crl_delta_period_units: Option<String>,
    #[arg(long = "crl-overlap-period-units", requires = "custom")]
    pub crl_overlap_period_units: Option<String>,
    #[arg(long = "validity-period-units", requires = "custom")]
    pub validity_period_units: Option<String>,
    #[arg(long = "backup-path")]
    pub backup_path: Option<PathBuf>,
    #[arg(long = "no-backup")]
    pub no_backup: bool,
    /// Leave Certificate Services running
    #[arg(long = "skip-restart")]
    pub skip_restart: bool,
    /// Leave the audit policy unchanged
    #[arg(long = "skip-audit")]
    pub skip_audit: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GalSyncArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Stop between entries after this many seconds
    #[arg(long = "max-runtime-secs")]
    pub max_runtime_secs: Option<u64>,
    /// Do not fall back to the Offline Global Address List
    #[arg(long = "no-offline-fallback")]
    pub no_offline_fallback: bool,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::CaConfig(args) => &args.common,
            Command::GalSync(args) => &args.common,
        }
    }

    /// `--log-path`, or the command's own log file beside the executable
    pub fn log_path(&self) -> PathBuf {
        let default_name = match self {
            Command::CaConfig(_) => CA_LOG_FILE,
            Command::GalSync(_) => GAL_LOG_FILE,
        };
        self.common()
            .log_path
            .clone()
            .unwrap_or_else(|| beside_executable(default_name))
    }
}

impl From<&CaConfigArgs> for CaConfigOptions {
    fn from(args: &CaConfigArgs) -> Self {
        Self {
            custom: args.custom,
            ds_config_dn: args.ds_config_dn.clone(),
            aia_fqdn: args.aia_fqdn.clone(),
            crl_period_units: args.crl_period_units.clone(),
            crl_delta_period_units: args.crl_delta_period_units.clone(),
            crl_overlap_period_units: args.crl_overlap_period_units.clone(),
            validity_period_units: args.validity_period_units.clone(),
            backup: !args.no_backup,
            backup_path: args
                .backup_path
                .clone()
                .unwrap_or_else(|| beside_executable(CA_BACKUP_FILE)),
            restart_service: !args.skip_restart,
            configure_audit: !args.skip_audit,
            timeout_secs: args.common.timeout_secs,
            ..Default::default()
        }
    }
}

impl From<&GalSyncArgs> for GalSyncOptions {
    fn from(args: &GalSyncArgs) -> Self {
        Self {
            timeout_secs: args.common.timeout_secs,
            max_runtime_secs: args.max_runtime_secs,
            use_offline_fallback: !args.no_offline_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ca_config_flags() {
        let cli = Cli::try_parse_from([
            "admin-reconcile",
            "ca-config",
            "--custom",
            "--crl-period-units",
            "26",
            "--aia-fqdn",
            "pki.contoso.com",
            "--no-backup",
            "--skip-restart",
            "--log-path",
            "/tmp/ca.log",
        ])
        .unwrap();

        assert_eq!(cli.cmd.log_path(), PathBuf::from("/tmp/ca.log"));
        let Command::CaConfig(args) = &cli.cmd else {
            panic!("expected ca-config");
        };
        let options = CaConfigOptions::from(args);
        assert!(options.custom);
        assert!(!options.backup);
        assert!(!options.restart_service);
        assert!(options.configure_audit);
        assert_eq!(options.crl_period_units.as_deref(), Some("26"));
        assert_eq!(options.aia_fqdn.as_deref(), Some("pki.contoso.com"));
        assert!(options.ds_config_dn.is_none());
        assert_eq!(options.timeout_secs, 120);
    }

    #[test]
    fn test_unit_override_requires_custom() {
        let parsed =
            Cli::try_parse_from(["admin-reconcile", "ca-config", "--crl-period-units", "26"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_gal_sync_defaults() {
        let cli =
            Cli::try_parse_from(["admin-reconcile", "gal-sync", "--max-runtime-secs", "600"])
                .unwrap();

        assert!(cli.cmd.log_path().ends_with(GAL_LOG_FILE));
        let Command::GalSync(args) = &cli.cmd else {
            panic!("expected gal-sync");
        };
        let options = GalSyncOptions::from(args);
        assert_eq!(options.max_runtime_secs, Some(600));
        assert!(options.use_offline_fallback);
        assert!(!args.common.json);
    }
}
