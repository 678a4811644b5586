//! vault: command-line driver for the Vault funnel session.
//!
//! Each invocation is one "app start": the stored session is loaded and
//! revalidated, the command runs, and the result is printed as JSON.
//!
//! ## Subcommands
//!
//! - `status`: load the session and print funnel state
//! - `capture`: first-touch attribution for a page view
//! - `dispatch`: apply one funnel action (JSON, or `-` for stdin)
//! - `resume`: jump a resumable session back into the funnel
//! - `start-over`: discard funnel progress (attribution is kept)
//! - `end-browsing-session`: drop browsing-session scoped records

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Vault funnel session driver")]
#[command(version)]
struct Cli {
    /// Storage root (default: ~/.vault, or [storage].root from the config)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Config file (default: <root>/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Load the session and print its state
    Status,

    /// Capture first-touch attribution for a page view
    Capture {
        /// Full page URL including query string
        #[arg(long)]
        url: String,

        /// Raw Cookie header
        #[arg(long)]
        cookie: Option<String>,

        /// Referring page URL
        #[arg(long)]
        referrer: Option<String>,
    },

    /// Apply one funnel action
    Dispatch {
        /// Action JSON, e.g. '{"type":"CONFIRM_VAULT"}' ("-" reads stdin)
        #[arg(value_name = "ACTION_JSON")]
        action: String,
    },

    /// Resume a returning visitor's session
    Resume,

    /// Discard funnel progress and start a new session
    StartOver,

    /// Clear records scoped to the browsing session
    EndBrowsingSession,
}

fn main() {
    let cli = Cli::parse();

    let context = match commands::Context::resolve(cli.root, cli.config) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("vault: {}", e);
            std::process::exit(1);
        }
    };

    let _logging_guard = logging::init(&context.storage.logs_dir());
    if let Some(warning) = context.config_warning.as_deref() {
        tracing::warn!(warning, "Using default configuration");
    }

    if let Err(e) = commands::run(cli.command, &context) {
        tracing::error!(error = %e, "vault command failed");
        std::process::exit(1);
    }
}
