//! # vault-core
//!
//! Core library for the Vault lead funnel: session persistence and resume,
//! first-touch attribution, lead existence validation and the funnel state
//! machine.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The lead lookup is the only
//!   blocking call and runs before the engine exists.
//! - **Not thread-safe**: One engine per browsing context. Clients provide their
//!   own synchronization if they share one.
//! - **Graceful degradation**: Corrupt, expired or orphaned sessions become a
//!   fresh start, never an error.
//! - **Single writer**: The session store is the only code that writes the
//!   session record.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vault_core::{capture_attribution, load_config, FileRecordStore, PageVisit,
//!     SessionStore, StorageConfig, VaultEngine};
//!
//! let storage = StorageConfig::from_home()?;
//! let config = load_config(&storage.config_file())?;
//! let attribution = capture_attribution(
//!     &FileRecordStore::new(storage.browsing_session_dir()),
//!     &PageVisit { url, cookie_header, referrer },
//! );
//! let store = SessionStore::new(FileRecordStore::new(storage.durable_dir()))
//!     .with_max_age(config.max_age());
//! let (mut engine, outcome) = VaultEngine::start(store, config.lead_directory().as_ref())?;
//! ```

pub mod attribution;
pub mod config;
pub mod engine;
pub mod error;
pub mod funnel;
pub mod remote;
pub mod session;
pub mod storage;
pub mod validator;

pub use attribution::{capture_attribution, extract_attribution, AttributionRecord, PageVisit};
pub use config::{load_config, VaultConfig};
pub use engine::VaultEngine;
pub use error::{Result, VaultError};
pub use funnel::{ActionKind, FunnelUpdate, TransitionTable, VaultAction, VaultReducerState};
pub use remote::HttpLeadDirectory;
pub use session::{
    BranchChoice, FormValues, FunnelStep, LoadOrigin, LoadOutcome, SessionPatch, SessionRecord,
    SessionStore, StepForm,
};
pub use storage::{FileRecordStore, MemoryRecordStore, RecordStore, StorageConfig};
pub use validator::{lead_exists, LeadDirectory, LookupError, UnconfiguredDirectory};
