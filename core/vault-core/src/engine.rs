//! VaultEngine - drives the funnel for one browsing context.
//!
//! The engine owns the session store and the reducer state and keeps them in
//! lockstep:
//! - **Load first**: `start()` runs the full load (including the lead existence
//!   check) before an engine exists, so nothing can be dispatched while the
//!   check is pending.
//! - **Validate at the edge**: form and scan payloads are checked before the
//!   reducer sees them.
//! - **Persist, then commit**: a transition only becomes the engine's state
//!   after the store has flushed it.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use vault_core::{FileRecordStore, SessionStore, StorageConfig, VaultEngine};
//!
//! let storage = StorageConfig::from_home()?;
//! let store = SessionStore::new(FileRecordStore::new(storage.durable_dir()));
//! let (mut engine, outcome) = VaultEngine::start(store, &directory)?;
//! if outcome.can_resume {
//!     engine.resume()?;
//! }
//! ```

use tracing::debug;
use vault_protocol::ErrorInfo;

use crate::error::Result;
use crate::funnel::{FunnelUpdate, TransitionTable, VaultAction, VaultReducerState};
use crate::session::{LoadOutcome, SessionPatch, SessionStore, StepForm};
use crate::storage::RecordStore;
use crate::validator::LeadDirectory;

pub struct VaultEngine<S> {
    store: SessionStore<S>,
    table: TransitionTable,
    state: VaultReducerState,
}

impl<S: RecordStore> VaultEngine<S> {
    /// Loads (and validates) the stored session and seeds the reducer from it.
    pub fn start(
        mut store: SessionStore<S>,
        directory: &dyn LeadDirectory,
    ) -> Result<(Self, LoadOutcome)> {
        let table = TransitionTable::standard()?;
        let outcome = store.load(directory)?;
        let state = VaultReducerState::from_record(&outcome.record);
        Ok((
            VaultEngine {
                store,
                table,
                state,
            },
            outcome,
        ))
    }

    pub fn state(&self) -> &VaultReducerState {
        &self.state
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    pub fn can_resume(&self) -> bool {
        self.store.can_resume()
    }

    /// Validates, reduces and persists one action.
    ///
    /// `Reset` always gets a store-minted event id; any id in the action is
    /// ignored. Rejected input and failed writes leave the state untouched.
    pub fn dispatch(&mut self, action: VaultAction) -> Result<FunnelUpdate> {
        validate_action(&action)?;

        if let VaultAction::Reset { .. } = action {
            return self.reset().map(|state| FunnelUpdate::Apply(state.clone()));
        }

        let next = match self.table.reduce(&self.state, &action) {
            FunnelUpdate::Apply(next) => next,
            FunnelUpdate::Skip => {
                debug!(
                    step = %self.state.current_step,
                    action = ?action.kind(),
                    "No transition for action"
                );
                return Ok(FunnelUpdate::Skip);
            }
        };

        let patch = patch_between(&self.state, &next);
        if !patch.is_empty() {
            self.store.save(&patch)?;
        }
        debug!(
            from = %self.state.current_step,
            to = %next.current_step,
            action = ?action.kind(),
            forms = ?patch.forms.iter().map(StepForm::step).collect::<Vec<_>>(),
            "Persisted funnel transition"
        );
        self.state = next.clone();
        Ok(FunnelUpdate::Apply(next))
    }

    /// Start over: new session record, new event id, first step.
    pub fn reset(&mut self) -> Result<&VaultReducerState> {
        let fresh = self.store.start_over()?;
        let action = VaultAction::Reset {
            event_id: fresh.event_id,
        };
        self.state = self.table.reduce(&self.state, &action).into_state(&self.state);
        Ok(&self.state)
    }

    /// Jumps a resumable session to the step after lead capture.
    pub fn resume(&mut self) -> Result<&VaultReducerState> {
        let record = self.store.resume()?;
        self.state = VaultReducerState::from_record(&record);
        Ok(&self.state)
    }
}

/// The form layer: payload checks that must pass before the reducer runs.
fn validate_action(action: &VaultAction) -> std::result::Result<(), ErrorInfo> {
    match action {
        VaultAction::SetLeadForm { lead_id, data } => {
            if lead_id.trim().is_empty() {
                return Err(ErrorInfo::new("missing_field", "leadId is required"));
            }
            data.validate()
        }
        VaultAction::SetPivotAnswer { data } => data.validate(),
        VaultAction::StartScan { file } => file.validate(),
        VaultAction::ScanCompleted { result } => result.validate(),
        VaultAction::SetProjectDetails { data } => data.validate(),
        VaultAction::SetEscalation { data } => data.validate(),
        VaultAction::ContinueFromResult
        | VaultAction::ConfirmVault
        | VaultAction::ShowExitIntercept
        | VaultAction::ResumeFromExit
        | VaultAction::Reset { .. } => Ok(()),
    }
}

/// Store patch that brings the persisted record from `prev` to `next`.
fn patch_between(prev: &VaultReducerState, next: &VaultReducerState) -> SessionPatch {
    let mut patch = SessionPatch::default();

    if next.lead_id != prev.lead_id {
        patch.lead_id = next.lead_id.clone();
    }
    if next.current_step != prev.current_step {
        patch.current_step = Some(next.current_step);
    }
    if next.branch_choice != prev.branch_choice {
        patch.branch_choice = Some(next.branch_choice);
    }
    if next.interrupted_step != prev.interrupted_step {
        patch.interrupted_step = Some(next.interrupted_step);
    }
    if next.scan_result != prev.scan_result {
        patch.scan_result = next.scan_result.clone();
    }
    if next.file_metadata != prev.file_metadata {
        patch.file_metadata = next.file_metadata.clone();
    }

    let (before, after) = (&prev.form_values, &next.form_values);
    if after.lead != before.lead {
        patch.forms.extend(after.lead.clone().map(StepForm::Lead));
    }
    if after.pivot != before.pivot {
        patch.forms.extend(after.pivot.clone().map(StepForm::Pivot));
    }
    if after.project_details != before.project_details {
        patch
            .forms
            .extend(after.project_details.clone().map(StepForm::ProjectDetails));
    }
    if after.escalation != before.escalation {
        patch
            .forms
            .extend(after.escalation.clone().map(StepForm::Escalation));
    }

    patch
}
