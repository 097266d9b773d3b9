//! Logging infrastructure
//!
//! File logging goes to an append-only log next to the executable unless a path is
//! given. Events are mirrored to stderr for the operator.

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directory containing the executable, resolved once per process
static EXECUTABLE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
});

/// Path of `file_name` in the executable's directory, e.g. the default `CAConfig.log`.
pub fn beside_executable(file_name: &str) -> PathBuf {
    EXECUTABLE_DIR.join(file_name)
}

/// Split a log path into the directory and file name the appender wants.
fn split_log_path(log_path: &Path) -> (PathBuf, String) {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = log_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "admin-reconcile.log".to_string());
    (dir, file)
}

/// Default filter directive for the given verbosity.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize logging to `log_path` and stderr.
///
/// Returns a guard that must be kept alive for the duration of the program
/// to ensure all logs are flushed to disk. `RUST_LOG` takes precedence over
/// `verbose`.
pub fn init_logging(log_path: &Path, verbose: bool) -> WorkerGuard {
    let (log_dir, file_name) = split_log_path(log_path);
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir.display(), e);
    }

    let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    guard
}
