//! Subcommand handlers. Each one returns the JSON document `run` prints.

use std::io::Read;
use std::path::PathBuf;

use serde_json::{json, Value};
use vault_core::{
    capture_attribution, load_config, FileRecordStore, FunnelUpdate, LoadOutcome, PageVisit,
    SessionStore, StorageConfig, VaultAction, VaultConfig, VaultEngine,
};

use crate::Commands;

/// Paths and settings resolved once per invocation.
pub(crate) struct Context {
    pub storage: StorageConfig,
    pub config: VaultConfig,
    /// Set when the config file could not be used and defaults were applied.
    pub config_warning: Option<String>,
}

impl Context {
    /// `--root` wins over `[storage].root`, which wins over `~/.vault`.
    /// The config file is `--config` or `<root>/config.toml`.
    pub fn resolve(root: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self, String> {
        let initial = match root.clone() {
            Some(root) => StorageConfig::with_root(root),
            None => StorageConfig::from_home()?,
        };
        let config_path = config_path.unwrap_or_else(|| initial.config_file());

        let (config, config_warning) = match load_config(&config_path) {
            Ok(config) => (config, None),
            Err(e) => (VaultConfig::default(), Some(e.to_string())),
        };

        let storage = match (root, config.storage.root.clone()) {
            (None, Some(configured)) => StorageConfig::with_root(configured),
            _ => initial,
        };

        Ok(Context {
            storage,
            config,
            config_warning,
        })
    }

    fn open_engine(&self) -> Result<(VaultEngine<FileRecordStore>, LoadOutcome), String> {
        let store = SessionStore::new(FileRecordStore::new(self.storage.durable_dir()))
            .with_max_age(self.config.max_age());
        let directory = self.config.lead_directory();
        Ok(VaultEngine::start(store, directory.as_ref())?)
    }

    fn browsing_session(&self) -> FileRecordStore {
        FileRecordStore::new(self.storage.browsing_session_dir())
    }
}

pub(crate) fn run(command: Commands, context: &Context) -> Result<(), String> {
    let output = execute(command, context)?;
    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| format!("Failed to render output: {}", e))?;
    println!("{}", rendered);
    Ok(())
}

pub(crate) fn execute(command: Commands, context: &Context) -> Result<Value, String> {
    match command {
        Commands::Status => {
            let (engine, outcome) = context.open_engine()?;
            tracing::info!(
                origin = ?outcome.origin,
                step = %engine.state().current_step,
                can_resume = outcome.can_resume,
                "Session loaded"
            );
            Ok(json!({
                "origin": outcome.origin,
                "canResume": engine.can_resume(),
                "state": engine.state(),
            }))
        }
        Commands::Capture {
            url,
            cookie,
            referrer,
        } => {
            let visit = PageVisit {
                url: &url,
                cookie_header: cookie.as_deref(),
                referrer: referrer.as_deref(),
            };
            let record = capture_attribution(&context.browsing_session(), &visit);
            Ok(json!({ "attribution": record }))
        }
        Commands::Dispatch { action } => {
            let raw = if action == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| format!("Failed to read action from stdin: {}", e))?;
                buf
            } else {
                action
            };
            let action = parse_action(&raw)?;

            let (mut engine, _) = context.open_engine()?;
            let update = engine.dispatch(action)?;
            Ok(json!({
                "applied": matches!(update, FunnelUpdate::Apply(_)),
                "canResume": engine.can_resume(),
                "state": engine.state(),
            }))
        }
        Commands::Resume => {
            let (mut engine, _) = context.open_engine()?;
            let state = engine.resume()?;
            Ok(json!({ "state": state }))
        }
        Commands::StartOver => {
            let (mut engine, _) = context.open_engine()?;
            let state = engine.reset()?;
            Ok(json!({ "state": state }))
        }
        Commands::EndBrowsingSession => {
            context.browsing_session().clear()?;
            tracing::info!("Browsing session records cleared");
            Ok(json!({ "cleared": true }))
        }
    }
}

fn parse_action(raw: &str) -> Result<VaultAction, String> {
    serde_json::from_str(raw.trim()).map_err(|e| format!("Invalid action JSON: {}", e))
}
