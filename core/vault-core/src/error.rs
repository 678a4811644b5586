//! Error types for vault-core operations.

use std::path::PathBuf;

use vault_protocol::ErrorInfo;

/// All errors that can occur in vault-core operations.
///
/// Recoverable conditions (corrupt or expired records, lookup outages) are
/// handled inside the store and validator and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory not found; pass an explicit storage root")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Session Lifecycle Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session has not been loaded")]
    SessionNotLoaded,

    #[error("Session is not resumable")]
    ResumeNotAllowed,

    #[error("Lead id already assigned: {existing} (attempted {attempted})")]
    LeadIdImmutable { existing: String, attempted: String },

    #[error("Invalid transition table: {0}")]
    TransitionTable(#[from] crate::funnel::TableError),

    // ─────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Rejected input: {0}")]
    InvalidInput(ErrorInfo),
}

/// Convenience type alias for Results using VaultError.
pub type Result<T> = std::result::Result<T, VaultError>;

impl From<ErrorInfo> for VaultError {
    fn from(info: ErrorInfo) -> Self {
        VaultError::InvalidInput(info)
    }
}

impl From<VaultError> for String {
    fn from(err: VaultError) -> String {
        err.to_string()
    }
}
