//! Tracing setup for the `vault` binary.
//!
//! Logs go to stderr and to a daily-rolling file under `<root>/logs/`.
//! `VAULT_LOG` takes an `EnvFilter` directive (default `info`);
//! `VAULT_DEBUG_LOG=1` forces `debug`.

use std::env;
use std::path::Path;

use fs_err as fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "vault.log";

/// Installs the global subscriber. Keep the guard alive until exit so the
/// file writer flushes.
pub fn init(log_dir: &Path) -> Option<WorkerGuard> {
    let debug_enabled = env::var("VAULT_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("VAULT_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // File logging is best effort; an unwritable log dir only loses the file copy.
    let (file_layer, guard) = match fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
