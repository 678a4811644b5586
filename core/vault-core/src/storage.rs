//! Storage configuration and record persistence for the Vault funnel.
//!
//! `StorageConfig` centralises every path the funnel touches, so tests can
//! point the whole thing at a temp directory with `StorageConfig::with_root()`.
//!
//! Records are whole-value JSON blobs addressed by a fixed namespaced key.
//! There are no field-level writes: every `write` replaces the prior value.
//!
//! # Atomic Writes
//!
//! `FileRecordStore` writes through a temp file + rename, so a crash mid-write
//! leaves either the old record or the new one, never a torn file.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs_err as fs;
use tempfile::NamedTempFile;

use crate::error::{Result, VaultError};

/// Key of the durable session record.
pub const SESSION_KEY: &str = "vault.session";
/// Key of the first-touch attribution record (browsing-session scope).
pub const ATTRIBUTION_KEY: &str = "vault.attribution";

/// Central configuration for all Vault storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all Vault data (default: ~/.vault)
    root: PathBuf,
}

impl StorageConfig {
    /// Storage rooted at `~/.vault`.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(VaultError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(".vault"),
        })
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Durable records that survive across browsing sessions.
    pub fn durable_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    /// Records scoped to the current browsing session. Cleared when it ends.
    pub fn browsing_session_dir(&self) -> PathBuf {
        self.root.join("browsing-session")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

/// Whole-value key/record storage.
///
/// Implementations must replace the full value on `write`; the session store
/// relies on that to avoid partial updates.
pub trait RecordStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub fn new(dir: PathBuf) -> Self {
        FileRecordStore { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deletes every record in the directory. Used when a browsing session ends.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(VaultError::Io {
                context: format!("clearing {}", self.dir.display()),
                source,
            }),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl RecordStore for FileRecordStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(VaultError::Io {
                context: format!("reading record {}", key),
                source,
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let io_err = |context: &str, source: std::io::Error| VaultError::Io {
            context: format!("{} {}", context, key),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(|e| io_err("creating dir for", e))?;
        let mut temp_file =
            NamedTempFile::new_in(&self.dir).map_err(|e| io_err("creating temp file for", e))?;
        temp_file
            .write_all(value.as_bytes())
            .map_err(|e| io_err("writing temp file for", e))?;
        temp_file
            .flush()
            .map_err(|e| io_err("flushing temp file for", e))?;
        temp_file
            .persist(self.path_for(key))
            .map_err(|e| io_err("committing", e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(VaultError::Io {
                context: format!("removing record {}", key),
                source,
            }),
        }
    }
}

/// In-process record storage for tests and ephemeral contexts.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.records().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.records().remove(key);
        Ok(())
    }
}
