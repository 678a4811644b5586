//! Session persistence and resume.
//!
//! One durable record per browsing context describes how far the visitor got.
//! It is loaded (and revalidated) on every start, rewritten on every funnel
//! mutation, and replaced wholesale on start-over.
//!
//! ```text
//! load ──► absent / corrupt / expired ─────────────► fresh, not resumable
//!      └─► has leadId ──► lead_exists? ── no ──────► fresh, not resumable
//!      │                              └── yes/err ─► kept, resumable*
//!      └─► no leadId ──────────────────────────────► kept, not resumable
//!
//! * unless the step is lead_capture or success
//! ```
//!
//! # Module Structure
//!
//! - [`store`]: [`SessionStore`] with `load` / `save` / `start_over` / `resume`
//! - [`types`]: [`SessionRecord`], [`SessionPatch`], [`FunnelStep`], form values

mod store;
pub(crate) mod types;

pub use store::{LoadOrigin, LoadOutcome, SessionStore};
pub use types::{
    BranchChoice, FormValues, FunnelStep, SessionPatch, SessionRecord, StepForm,
    DEFAULT_MAX_AGE_DAYS,
};
