//! Runtime configuration (`config.toml`).
//!
//! ```toml
//! [session]
//! max_age_days = 7
//!
//! [lead_lookup]
//! base_url = "https://api.example.com/v1"
//! timeout_ms = 5000
//!
//! [storage]
//! root = "/var/lib/vault"
//! ```
//!
//! Every section and key is optional. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Deserialize;

use crate::error::{Result, VaultError};
use crate::remote::{HttpLeadDirectory, DEFAULT_LOOKUP_TIMEOUT_MS};
use crate::session::DEFAULT_MAX_AGE_DAYS;
use crate::validator::{LeadDirectory, UnconfiguredDirectory};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub lead_lookup: LeadLookupConfig,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeadLookupConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LeadLookupConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_max_age_days() -> i64 {
    DEFAULT_MAX_AGE_DAYS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

impl VaultConfig {
    /// Falls back to the default for values chrono cannot represent;
    /// `load_config` rejects those up front.
    pub fn max_age(&self) -> Duration {
        Duration::try_days(self.session.max_age_days)
            .unwrap_or_else(|| Duration::days(DEFAULT_MAX_AGE_DAYS))
    }

    /// HTTP directory when a base URL is configured, otherwise one that fails
    /// every lookup (and so resumes every lead-bearing session).
    pub fn lead_directory(&self) -> Box<dyn LeadDirectory> {
        match self.lead_lookup.base_url.as_deref() {
            Some(base_url) if !base_url.trim().is_empty() => Box::new(HttpLeadDirectory::new(
                base_url,
                StdDuration::from_millis(self.lead_lookup.timeout_ms),
            )),
            _ => Box::new(UnconfiguredDirectory),
        }
    }
}

/// Loads `path`, returning defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<VaultConfig> {
    if !path.exists() {
        return Ok(VaultConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| VaultError::Io {
        context: format!("reading config {}", path.display()),
        source,
    })?;
    let config = toml::from_str::<VaultConfig>(&content).map_err(|err| {
        VaultError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        }
    })?;

    if config.session.max_age_days <= 0 {
        return Err(VaultError::ConfigMalformed {
            path: path.to_path_buf(),
            details: "session.max_age_days must be positive".to_string(),
        });
    }
    if Duration::try_days(config.session.max_age_days).is_none() {
        return Err(VaultError::ConfigMalformed {
            path: path.to_path_buf(),
            details: format!(
                "session.max_age_days {} is out of range",
                config.session.max_age_days
            ),
        });
    }
    Ok(config)
}
