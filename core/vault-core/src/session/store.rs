//! Durable session persistence.
//!
//! The store owns the single session record for a browsing context. It is the
//! only writer of the record and flushes every mutation before returning.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "session": { ... SessionRecord fields ... }
//! }
//! ```
//!
//! # Defensive Design
//!
//! Anything unexpected on disk falls back to a fresh session:
//! - Missing record
//! - Empty or corrupt JSON (logged)
//! - Unsupported version (logged)
//! - Expired record (older than the max age)
//! - Lead that no longer exists server-side

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, VaultError};
use crate::storage::{RecordStore, SESSION_KEY};
use crate::validator::{lead_exists, LeadDirectory};

use super::types::{FunnelStep, SessionPatch, SessionRecord, DEFAULT_MAX_AGE_DAYS};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    session: SessionRecord,
}

/// Why `load()` ended up with the record it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrigin {
    /// Nothing was stored.
    Created,
    /// Stored record was unreadable or had an unsupported version.
    Corrupt,
    Expired,
    /// Stored record referenced a lead the directory no longer knows.
    LeadMissing,
    /// Stored record was accepted.
    Restored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub record: SessionRecord,
    pub can_resume: bool,
    pub origin: LoadOrigin,
}

/// Session manager for one browsing context.
///
/// Construct once, call [`SessionStore::load`], then pass it by reference to
/// whatever drives the funnel.
pub struct SessionStore<S> {
    backend: S,
    max_age: Duration,
    record: Option<SessionRecord>,
    can_resume: bool,
}

impl<S: RecordStore> SessionStore<S> {
    pub fn new(backend: S) -> Self {
        SessionStore {
            backend,
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
            record: None,
            can_resume: false,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    pub fn can_resume(&self) -> bool {
        self.can_resume
    }

    pub fn load(&mut self, directory: &dyn LeadDirectory) -> Result<LoadOutcome> {
        self.load_at(Utc::now(), directory)
    }

    pub fn load_at(
        &mut self,
        now: DateTime<Utc>,
        directory: &dyn LeadDirectory,
    ) -> Result<LoadOutcome> {
        let mut stored = match self.read_stored() {
            Ok(Some(record)) => record,
            Ok(None) => return self.replace_with_fresh(now, LoadOrigin::Created),
            Err(reason) => {
                warn!(reason = %reason, "Discarding unreadable session record");
                return self.replace_with_fresh(now, LoadOrigin::Corrupt);
            }
        };

        if stored.is_expired_at(now, self.max_age) {
            info!(
                event_id = %stored.event_id,
                created_at = %stored.created_at.to_rfc3339(),
                "Session expired; starting fresh"
            );
            return self.replace_with_fresh(now, LoadOrigin::Expired);
        }

        let can_resume = match stored.lead_id.clone() {
            None => false,
            Some(lead_id) => {
                if !lead_exists(directory, &lead_id) {
                    return self.replace_with_fresh(now, LoadOrigin::LeadMissing);
                }
                // Lead capture is complete once a lead id exists.
                if stored.current_step == FunnelStep::LeadCapture {
                    info!(
                        event_id = %stored.event_id,
                        "Session has a lead but sits on lead capture; advancing"
                    );
                    stored.current_step = FunnelStep::PivotQuestion;
                    stored.interrupted_step = None;
                    stored.updated_at = now;
                    self.persist(&stored)?;
                }
                stored.current_step.offers_resume()
            }
        };

        debug!(
            event_id = %stored.event_id,
            step = %stored.current_step,
            can_resume,
            "Restored session"
        );
        self.record = Some(stored.clone());
        self.can_resume = can_resume;
        Ok(LoadOutcome {
            record: stored,
            can_resume,
            origin: LoadOrigin::Restored,
        })
    }

    /// Merges `patch` into the current record and flushes it.
    ///
    /// On any failure the previous record stays authoritative, in memory and on
    /// disk.
    pub fn save(&mut self, patch: &SessionPatch) -> Result<SessionRecord> {
        self.save_at(Utc::now(), patch)
    }

    pub fn save_at(&mut self, now: DateTime<Utc>, patch: &SessionPatch) -> Result<SessionRecord> {
        let current = self.record.as_ref().ok_or(VaultError::SessionNotLoaded)?;
        let next = current.merged(patch, now)?;
        self.persist(&next)?;
        self.record = Some(next.clone());
        Ok(next)
    }

    /// Replaces the session with a brand-new one. Attribution lives elsewhere
    /// and is not touched.
    pub fn start_over(&mut self) -> Result<SessionRecord> {
        let fresh = SessionRecord::fresh(Utc::now());
        self.persist(&fresh)?;
        info!(event_id = %fresh.event_id, "Session restarted");
        self.record = Some(fresh.clone());
        self.can_resume = false;
        Ok(fresh)
    }

    /// Moves a resumable session to the step right after lead capture.
    pub fn resume(&mut self) -> Result<SessionRecord> {
        if !self.can_resume {
            return Err(VaultError::ResumeNotAllowed);
        }
        let patch = SessionPatch {
            current_step: Some(FunnelStep::PivotQuestion),
            interrupted_step: Some(None),
            ..SessionPatch::default()
        };
        let record = self.save(&patch)?;
        self.can_resume = false;
        Ok(record)
    }

    fn read_stored(&self) -> std::result::Result<Option<SessionRecord>, String> {
        let raw = match self.backend.read(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(err) => return Err(err.to_string()),
        };

        if raw.trim().is_empty() {
            return Err("empty session record".to_string());
        }

        match serde_json::from_str::<StoreFile>(&raw) {
            Ok(file) if file.version == STORE_VERSION => Ok(Some(file.session)),
            Ok(file) => Err(format!(
                "unsupported session record version {} (expected {})",
                file.version, STORE_VERSION
            )),
            Err(err) => Err(err.to_string()),
        }
    }

    fn replace_with_fresh(
        &mut self,
        now: DateTime<Utc>,
        origin: LoadOrigin,
    ) -> Result<LoadOutcome> {
        let fresh = SessionRecord::fresh(now);
        self.persist(&fresh)?;
        debug!(event_id = %fresh.event_id, origin = ?origin, "Created fresh session");
        self.record = Some(fresh.clone());
        self.can_resume = false;
        Ok(LoadOutcome {
            record: fresh,
            can_resume: false,
            origin,
        })
    }

    fn persist(&self, record: &SessionRecord) -> Result<()> {
        let file = StoreFile {
            version: STORE_VERSION,
            session: record.clone(),
        };
        let payload = serde_json::to_string_pretty(&file).map_err(|source| VaultError::Json {
            context: "serializing session record".to_string(),
            source,
        })?;
        self.backend.write(SESSION_KEY, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{BranchChoice, StepForm};
    use crate::storage::MemoryRecordStore;
    use crate::validator::test_support::FakeDirectory;
    use std::cell::Cell;
    use vault_protocol::{PivotAnswer, PivotFormData};

    fn seed(store: &MemoryRecordStore, record: &SessionRecord) {
        let file = StoreFile {
            version: STORE_VERSION,
            session: record.clone(),
        };
        store
            .write(SESSION_KEY, &serde_json::to_string(&file).unwrap())
            .unwrap();
    }

    fn stored(store: &MemoryRecordStore) -> SessionRecord {
        let raw = store.read(SESSION_KEY).unwrap().expect("record persisted");
        serde_json::from_str::<StoreFile>(&raw).unwrap().session
    }

    fn lead_session(now: DateTime<Utc>, step: FunnelStep) -> SessionRecord {
        let mut record = SessionRecord::fresh(now - Duration::hours(1));
        record.lead_id = Some("42".to_string());
        record.current_step = step;
        record
    }

    /// Backend whose writes can be switched off.
    struct FlakyStore {
        inner: MemoryRecordStore,
        fail_writes: Cell<bool>,
    }

    impl RecordStore for FlakyStore {
        fn read(&self, key: &str) -> Result<Option<String>> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes.get() {
                return Err(VaultError::Io {
                    context: "disk full".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_fresh_visitor_gets_new_session() {
        let mut store = SessionStore::new(MemoryRecordStore::new());
        let outcome = store.load(&FakeDirectory::failing()).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::Created);
        assert_eq!(outcome.record.current_step, FunnelStep::LeadCapture);
        assert!(outcome.record.lead_id.is_none());
        assert!(!outcome.record.event_id.is_empty());
        assert!(!outcome.can_resume);
        assert_eq!(stored(store.backend()), outcome.record);
    }

    #[test]
    fn test_corrupt_record_is_replaced() {
        let backend = MemoryRecordStore::new();
        backend.write(SESSION_KEY, "{\"version\":1,\"session\":").unwrap();

        let mut store = SessionStore::new(backend);
        let outcome = store.load(&FakeDirectory::existing(42)).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::Corrupt);
        assert!(!outcome.can_resume);
        assert_eq!(stored(store.backend()), outcome.record);
    }

    #[test]
    fn test_unsupported_version_is_corrupt() {
        let backend = MemoryRecordStore::new();
        let record = lead_session(Utc::now(), FunnelStep::ProjectDetails);
        let payload = serde_json::json!({ "version": 99, "session": record });
        backend.write(SESSION_KEY, &payload.to_string()).unwrap();

        let mut store = SessionStore::new(backend);
        let outcome = store.load(&FakeDirectory::existing(42)).expect("load");
        assert_eq!(outcome.origin, LoadOrigin::Corrupt);
        assert_ne!(outcome.record.event_id, record.event_id);
    }

    #[test]
    fn test_expired_session_is_never_resumed() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let mut record = lead_session(now, FunnelStep::ProjectDetails);
        record.created_at = now - Duration::days(8);
        seed(&backend, &record);

        let directory = FakeDirectory::existing(42);
        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &directory).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::Expired);
        assert!(!outcome.can_resume);
        assert_ne!(outcome.record.event_id, record.event_id);
        assert_eq!(outcome.record.current_step, FunnelStep::LeadCapture);
        assert_eq!(directory.calls.get(), 0, "expired sessions skip the lookup");
    }

    #[test]
    fn test_existing_lead_is_resumable() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let record = lead_session(now, FunnelStep::ProjectDetails);
        seed(&backend, &record);

        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &FakeDirectory::existing(42)).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::Restored);
        assert!(outcome.can_resume);
        assert_eq!(outcome.record, record);

        let resumed = store.resume().expect("resume");
        assert_eq!(resumed.current_step, FunnelStep::PivotQuestion);
        assert_eq!(resumed.event_id, record.event_id);
        assert_eq!(stored(store.backend()).current_step, FunnelStep::PivotQuestion);
    }

    #[test]
    fn test_missing_lead_restarts() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let record = lead_session(now, FunnelStep::ProjectDetails);
        seed(&backend, &record);

        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &FakeDirectory::missing()).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::LeadMissing);
        assert!(!outcome.can_resume);
        assert!(outcome.record.lead_id.is_none());
        assert!(matches!(store.resume(), Err(VaultError::ResumeNotAllowed)));
    }

    #[test]
    fn test_lookup_failure_resumes_as_if_present() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let record = lead_session(now, FunnelStep::ResultDisplay);
        seed(&backend, &record);

        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &FakeDirectory::failing()).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::Restored);
        assert!(outcome.can_resume);
        assert_eq!(outcome.record, record);
    }

    #[test]
    fn test_malformed_lead_id_restarts() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let mut record = lead_session(now, FunnelStep::ProjectDetails);
        record.lead_id = Some("abc".to_string());
        seed(&backend, &record);

        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &FakeDirectory::failing()).expect("load");
        assert_eq!(outcome.origin, LoadOrigin::LeadMissing);
        assert!(!outcome.can_resume);
    }

    #[test]
    fn test_session_without_lead_is_kept_but_not_resumable() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let mut record = SessionRecord::fresh(now - Duration::minutes(5));
        record.current_step = FunnelStep::LeadCapture;
        seed(&backend, &record);

        let directory = FakeDirectory::existing(1);
        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &directory).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::Restored);
        assert_eq!(outcome.record, record);
        assert!(!outcome.can_resume);
        assert_eq!(directory.calls.get(), 0);
    }

    #[test]
    fn test_lead_on_lead_capture_is_advanced() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let record = lead_session(now, FunnelStep::LeadCapture);
        seed(&backend, &record);

        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &FakeDirectory::existing(42)).expect("load");

        assert_eq!(outcome.origin, LoadOrigin::Restored);
        assert_eq!(outcome.record.current_step, FunnelStep::PivotQuestion);
        assert_eq!(outcome.record.lead_id.as_deref(), Some("42"));
        assert_eq!(outcome.record.event_id, record.event_id);
        assert!(outcome.can_resume);
        assert_eq!(stored(store.backend()), outcome.record);
    }

    #[test]
    fn test_completed_session_is_not_resumable() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        seed(&backend, &lead_session(now, FunnelStep::Success));

        let mut store = SessionStore::new(backend);
        let outcome = store.load_at(now, &FakeDirectory::existing(42)).expect("load");
        assert_eq!(outcome.origin, LoadOrigin::Restored);
        assert!(!outcome.can_resume);
    }

    #[test]
    fn test_save_merges_and_keeps_event_id() {
        let mut store = SessionStore::new(MemoryRecordStore::new());
        let loaded = store.load(&FakeDirectory::failing()).expect("load").record;

        let first = store
            .save(&SessionPatch {
                lead_id: Some("7".to_string()),
                current_step: Some(FunnelStep::PivotQuestion),
                ..SessionPatch::default()
            })
            .expect("save");
        let second = store
            .save(&SessionPatch {
                branch_choice: Some(BranchChoice::No),
                forms: vec![StepForm::Pivot(PivotFormData {
                    answer: PivotAnswer::No,
                })],
                current_step: Some(FunnelStep::FinalEscalation),
                ..SessionPatch::default()
            })
            .expect("save");

        assert_eq!(first.event_id, loaded.event_id);
        assert_eq!(second.event_id, loaded.event_id);
        assert_eq!(second.created_at, loaded.created_at);
        assert_eq!(second.lead_id.as_deref(), Some("7"));
        assert_eq!(second.branch_choice, BranchChoice::No);
        assert_eq!(second.current_step, FunnelStep::FinalEscalation);
        assert!(second.updated_at >= loaded.updated_at);
        assert_eq!(stored(store.backend()), second);
    }

    #[test]
    fn test_save_before_load_is_rejected() {
        let mut store = SessionStore::new(MemoryRecordStore::new());
        assert!(matches!(
            store.save(&SessionPatch::default()),
            Err(VaultError::SessionNotLoaded)
        ));
    }

    #[test]
    fn test_failed_write_keeps_prior_state() {
        let backend = FlakyStore {
            inner: MemoryRecordStore::new(),
            fail_writes: Cell::new(false),
        };
        let mut store = SessionStore::new(backend);
        let loaded = store.load(&FakeDirectory::failing()).expect("load").record;

        store.backend().fail_writes.set(true);
        let result = store.save(&SessionPatch {
            current_step: Some(FunnelStep::PivotQuestion),
            lead_id: Some("9".to_string()),
            ..SessionPatch::default()
        });

        assert!(result.is_err());
        assert_eq!(store.record(), Some(&loaded));
        assert_eq!(stored(&store.backend().inner), loaded);
    }

    #[test]
    fn test_start_over_replaces_everything() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        let record = lead_session(now, FunnelStep::ProjectDetails);
        seed(&backend, &record);

        let mut store = SessionStore::new(backend);
        store.load_at(now, &FakeDirectory::existing(42)).expect("load");
        let fresh = store.start_over().expect("start over");

        assert_ne!(fresh.event_id, record.event_id);
        assert!(fresh.lead_id.is_none());
        assert_eq!(fresh.current_step, FunnelStep::LeadCapture);
        assert!(!store.can_resume());
        assert_eq!(stored(store.backend()), fresh);
    }

    #[test]
    fn test_custom_max_age() {
        let now = Utc::now();
        let backend = MemoryRecordStore::new();
        seed(&backend, &lead_session(now, FunnelStep::ProjectDetails));

        let mut store = SessionStore::new(backend).with_max_age(Duration::minutes(30));
        let outcome = store.load_at(now, &FakeDirectory::existing(42)).expect("load");
        assert_eq!(outcome.origin, LoadOrigin::Expired);
    }
}
