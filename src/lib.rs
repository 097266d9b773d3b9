pub mod cli;
pub mod commands;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod logging;
pub mod reconcile;

use clap::Parser;
use cli::{Cli, Command};
use commands::{
    execute_ca_config, execute_gal_sync, render_apply_report, render_sync_report, CaConfigOptions,
    GalSyncOptions,
};
use domain::ApplyReport;
use error::{AppError, AppResult, CommandError};
use serde::Serialize;
use std::process::ExitCode;

const EXIT_OK: u8 = 0;
/// Fatal error or invalid invocation
const EXIT_FATAL: u8 = 1;
/// Some CA settings could not be written
const EXIT_PARTIAL: u8 = 2;

/// `--help` and `--version` are not failures; every usage error is fatal.
fn parse_failure_status(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        EXIT_FATAL
    } else {
        EXIT_OK
    }
}

fn error_status(err: &AppError) -> u8 {
    if err.is_fatal() {
        EXIT_FATAL
    } else {
        EXIT_PARTIAL
    }
}

fn apply_status(report: &ApplyReport) -> u8 {
    if report.success() {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}

fn print_report<T: Serialize>(
    report: &T,
    json: bool,
    render: impl Fn(&T) -> String,
) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render(report));
    }
    Ok(())
}

fn dispatch(cmd: &Command) -> AppResult<u8> {
    let json = cmd.common().json;
    match cmd {
        Command::CaConfig(args) => {
            let report = execute_ca_config(&CaConfigOptions::from(args))?;
            print_report(&report, json, render_apply_report)?;
            Ok(apply_status(&report))
        }
        Command::GalSync(args) => {
            let report = execute_gal_sync(&GalSyncOptions::from(args))?;
            print_report(&report, json, render_sync_report)?;
            Ok(EXIT_OK)
        }
    }
}

pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_failure_status(&e));
        }
    };

    // Keep the guard alive so buffered log lines reach the file
    let _guard = logging::init_logging(&cli.cmd.log_path(), cli.cmd.common().verbose);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admin-reconcile starting");

    let status = match dispatch(&cli.cmd) {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "Command failed");
            let status = error_status(&e);
            if cli.cmd.common().json {
                let err = CommandError::from(e);
                match serde_json::to_string_pretty(&err) {
                    Ok(text) => println!("{}", text),
                    Err(_) => eprintln!("{}: {}", err.code, err.message),
                }
            } else {
                eprintln!("Error: {}", e);
            }
            status
        }
    };
    ExitCode::from(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_status(args: &[&str]) -> u8 {
        match Cli::try_parse_from(args) {
            Ok(_) => EXIT_OK,
            Err(e) => parse_failure_status(&e),
        }
    }

    #[test]
    fn test_usage_errors_are_fatal_not_partial() {
        assert_eq!(
            parse_status(&["admin-reconcile", "ca-config", "--crl-period-units", "26"]),
            EXIT_FATAL
        );
        assert_eq!(parse_status(&["admin-reconcile", "no-such-command"]), EXIT_FATAL);
        assert_eq!(parse_status(&["admin-reconcile"]), EXIT_FATAL);
    }

    #[test]
    fn test_help_and_version_exit_cleanly() {
        assert_eq!(parse_status(&["admin-reconcile", "--help"]), EXIT_OK);
        assert_eq!(parse_status(&["admin-reconcile", "--version"]), EXIT_OK);
        assert_eq!(parse_status(&["admin-reconcile", "gal-sync", "--help"]), EXIT_OK);
    }

    #[test]
    fn test_only_setting_write_failures_are_partial() {
        let write = AppError::RegistryWriteError {
            name: "CRLPeriodUnits".to_string(),
            output: "FAILED".to_string(),
        };
        assert_eq!(error_status(&write), EXIT_PARTIAL);
        assert_eq!(error_status(&AppError::BackupError("denied".to_string())), EXIT_FATAL);
        assert_eq!(error_status(&AppError::Cancelled), EXIT_FATAL);

        let mut report = ApplyReport::new("ROOT-CA");
        assert_eq!(apply_status(&report), EXIT_OK);
        report.results.push(domain::SettingWriteResult {
            name: "CRLPeriodUnits".to_string(),
            value: "52".to_string(),
            success: false,
            output: "FAILED".to_string(),
        });
        assert_eq!(apply_status(&report), EXIT_PARTIAL);
    }
}
