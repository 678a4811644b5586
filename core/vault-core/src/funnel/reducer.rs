//! Reducer state, funnel actions and the pure `reduce` over the transition table.

use serde::{Deserialize, Serialize};
use vault_protocol::{
    EscalationFormData, FileMetadata, LeadFormData, PivotFormData, ProjectDetailsFormData,
    ScanResult,
};

use crate::session::{BranchChoice, FormValues, FunnelStep, SessionRecord};

use super::table::{ActionKind, Target, TransitionTable};

/// Everything the funnel needs to decide what to show next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultReducerState {
    pub current_step: FunnelStep,
    pub branch_choice: BranchChoice,
    pub interrupted_step: Option<FunnelStep>,
    pub lead_id: Option<String>,
    pub event_id: String,
    pub form_values: FormValues,
    pub scan_result: Option<ScanResult>,
    pub file_metadata: Option<FileMetadata>,
}

impl VaultReducerState {
    pub fn fresh(event_id: String) -> Self {
        VaultReducerState {
            current_step: FunnelStep::LeadCapture,
            branch_choice: BranchChoice::Unset,
            interrupted_step: None,
            lead_id: None,
            event_id,
            form_values: FormValues::default(),
            scan_result: None,
            file_metadata: None,
        }
    }

    pub fn from_record(record: &SessionRecord) -> Self {
        VaultReducerState {
            current_step: record.current_step,
            branch_choice: record.branch_choice,
            interrupted_step: record.interrupted_step,
            lead_id: record.lead_id.clone(),
            event_id: record.event_id.clone(),
            form_values: record.form_values.clone(),
            scan_result: record.scan_result.clone(),
            file_metadata: record.file_metadata.clone(),
        }
    }
}

/// Funnel actions. Payloads are assumed to have passed form validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultAction {
    SetLeadForm {
        #[serde(rename = "leadId")]
        lead_id: String,
        data: LeadFormData,
    },
    SetPivotAnswer {
        data: PivotFormData,
    },
    StartScan {
        file: FileMetadata,
    },
    ScanCompleted {
        result: ScanResult,
    },
    ContinueFromResult,
    ConfirmVault,
    SetProjectDetails {
        data: ProjectDetailsFormData,
    },
    SetEscalation {
        data: EscalationFormData,
    },
    ShowExitIntercept,
    ResumeFromExit,
    Reset {
        #[serde(rename = "eventId", default)]
        event_id: String,
    },
}

impl VaultAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            VaultAction::SetLeadForm { .. } => ActionKind::SetLeadForm,
            VaultAction::SetPivotAnswer { .. } => ActionKind::SetPivotAnswer,
            VaultAction::StartScan { .. } => ActionKind::StartScan,
            VaultAction::ScanCompleted { .. } => ActionKind::ScanCompleted,
            VaultAction::ContinueFromResult => ActionKind::ContinueFromResult,
            VaultAction::ConfirmVault => ActionKind::ConfirmVault,
            VaultAction::SetProjectDetails { .. } => ActionKind::SetProjectDetails,
            VaultAction::SetEscalation { .. } => ActionKind::SetEscalation,
            VaultAction::ShowExitIntercept => ActionKind::ShowExitIntercept,
            VaultAction::ResumeFromExit => ActionKind::ResumeFromExit,
            VaultAction::Reset { .. } => ActionKind::Reset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum FunnelUpdate {
    Apply(VaultReducerState),
    /// No edge for this action from the current state; nothing changes.
    Skip,
}

impl FunnelUpdate {
    /// The resulting state, falling back to `current` on skip.
    pub fn into_state(self, current: &VaultReducerState) -> VaultReducerState {
        match self {
            FunnelUpdate::Apply(next) => next,
            FunnelUpdate::Skip => current.clone(),
        }
    }
}

impl TransitionTable {
    /// Pure transition: builds the complete next state or returns `Skip`.
    pub fn reduce(&self, state: &VaultReducerState, action: &VaultAction) -> FunnelUpdate {
        let Some(target) = self.lookup(state.current_step, action.kind()) else {
            return FunnelUpdate::Skip;
        };

        if let VaultAction::Reset { event_id } = action {
            return FunnelUpdate::Apply(VaultReducerState::fresh(event_id.clone()));
        }

        let mut next = state.clone();
        match action {
            VaultAction::SetLeadForm { lead_id, data } => {
                // A lead id is assigned once; a second submission is a duplicate.
                if state.lead_id.is_some() {
                    return FunnelUpdate::Skip;
                }
                next.lead_id = Some(lead_id.clone());
                next.form_values.lead = Some(data.clone());
            }
            VaultAction::SetPivotAnswer { data } => {
                if next.branch_choice == BranchChoice::Unset {
                    next.branch_choice = data.answer.into();
                }
                next.form_values.pivot = Some(data.clone());
            }
            VaultAction::StartScan { file } => {
                next.file_metadata = Some(file.clone());
            }
            VaultAction::ScanCompleted { result } => {
                next.scan_result = Some(result.clone());
            }
            VaultAction::SetProjectDetails { data } => {
                next.form_values.project_details = Some(data.clone());
            }
            VaultAction::SetEscalation { data } => {
                next.form_values.escalation = Some(data.clone());
            }
            VaultAction::ContinueFromResult
            | VaultAction::ConfirmVault
            | VaultAction::ShowExitIntercept
            | VaultAction::ResumeFromExit
            | VaultAction::Reset { .. } => {}
        }

        let destination = match target {
            Target::Step(step) => step,
            Target::Branch => match next.branch_choice {
                BranchChoice::Yes => FunnelStep::ScannerUpload,
                BranchChoice::No => FunnelStep::FinalEscalation,
                BranchChoice::Unset => return FunnelUpdate::Skip,
            },
            Target::Overlay => {
                next.interrupted_step = Some(state.current_step);
                FunnelStep::ExitIntercept
            }
            Target::Interrupted => match state.interrupted_step {
                Some(step) => {
                    next.interrupted_step = None;
                    step
                }
                None => return FunnelUpdate::Skip,
            },
            Target::Restart => FunnelStep::LeadCapture,
        };
        next.current_step = destination;

        FunnelUpdate::Apply(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_protocol::{ContactPreference, PivotAnswer, ScanScores};

    fn table() -> TransitionTable {
        TransitionTable::standard().expect("standard table")
    }

    fn at(step: FunnelStep) -> VaultReducerState {
        let mut state = VaultReducerState::fresh("evt-1".to_string());
        state.current_step = step;
        if step != FunnelStep::LeadCapture {
            state.lead_id = Some("42".to_string());
        }
        state
    }

    fn apply(state: &VaultReducerState, action: VaultAction) -> VaultReducerState {
        match table().reduce(state, &action) {
            FunnelUpdate::Apply(next) => next,
            FunnelUpdate::Skip => panic!("{:?} skipped from {}", action, state.current_step),
        }
    }

    fn pivot(answer: PivotAnswer) -> VaultAction {
        VaultAction::SetPivotAnswer {
            data: PivotFormData { answer },
        }
    }

    fn lead_action(lead_id: &str) -> VaultAction {
        VaultAction::SetLeadForm {
            lead_id: lead_id.to_string(),
            data: LeadFormData {
                name: "Dana".to_string(),
                email: "dana@example.com".to_string(),
                phone: None,
                zip: None,
            },
        }
    }

    fn scan_result() -> ScanResult {
        ScanResult {
            scores: ScanScores {
                pricing: 10,
                scope: 20,
                warranty: 30,
                fine_print: 40,
                safety: 50,
            },
            overall: 30,
            warnings: vec![],
            missing_items: vec!["Lead paint disclosure".to_string()],
            savings: None,
        }
    }

    #[test]
    fn test_lead_submission_assigns_lead_id() {
        let next = apply(&at(FunnelStep::LeadCapture), lead_action("42"));
        assert_eq!(next.current_step, FunnelStep::PivotQuestion);
        assert_eq!(next.lead_id.as_deref(), Some("42"));
        assert!(next.form_values.lead.is_some());
    }

    #[test]
    fn test_duplicate_lead_submission_is_skipped() {
        let mut state = at(FunnelStep::LeadCapture);
        state.lead_id = Some("42".to_string());
        assert_eq!(table().reduce(&state, &lead_action("43")), FunnelUpdate::Skip);
    }

    #[test]
    fn test_pivot_yes_goes_to_upload() {
        let next = apply(&at(FunnelStep::PivotQuestion), pivot(PivotAnswer::Yes));
        assert_eq!(next.current_step, FunnelStep::ScannerUpload);
        assert_eq!(next.branch_choice, BranchChoice::Yes);
    }

    #[test]
    fn test_pivot_no_skips_scan() {
        let next = apply(&at(FunnelStep::PivotQuestion), pivot(PivotAnswer::No));
        assert_eq!(next.current_step, FunnelStep::FinalEscalation);
        assert_eq!(next.branch_choice, BranchChoice::No);
    }

    #[test]
    fn test_branch_choice_is_write_once() {
        let mut state = at(FunnelStep::PivotQuestion);
        state.branch_choice = BranchChoice::No;
        let next = apply(&state, pivot(PivotAnswer::Yes));
        assert_eq!(next.branch_choice, BranchChoice::No);
        assert_eq!(next.current_step, FunnelStep::FinalEscalation);
        assert_eq!(
            next.form_values.pivot,
            Some(PivotFormData {
                answer: PivotAnswer::Yes
            })
        );
    }

    #[test]
    fn test_full_yes_path() {
        let mut state = apply(&at(FunnelStep::LeadCapture), lead_action("42"));
        let steps = [
            (pivot(PivotAnswer::Yes), FunnelStep::ScannerUpload),
            (
                VaultAction::StartScan {
                    file: FileMetadata {
                        name: "quote.pdf".to_string(),
                        size_bytes: 1024,
                        mime_type: "application/pdf".to_string(),
                    },
                },
                FunnelStep::AnalysisTheater,
            ),
            (
                VaultAction::ScanCompleted {
                    result: scan_result(),
                },
                FunnelStep::ResultDisplay,
            ),
            (VaultAction::ContinueFromResult, FunnelStep::VaultConfirmation),
            (VaultAction::ConfirmVault, FunnelStep::ProjectDetails),
            (
                VaultAction::SetProjectDetails {
                    data: ProjectDetailsFormData {
                        project_type: "windows".to_string(),
                        timeline: "3 months".to_string(),
                        budget_range: None,
                        notes: None,
                    },
                },
                FunnelStep::FinalEscalation,
            ),
            (
                VaultAction::SetEscalation {
                    data: EscalationFormData {
                        preference: ContactPreference::Call,
                        best_time: None,
                    },
                },
                FunnelStep::Success,
            ),
        ];
        for (action, expected) in steps {
            state = apply(&state, action);
            assert_eq!(state.current_step, expected);
        }
        assert_eq!(state.scan_result, Some(scan_result()));
        assert!(state.file_metadata.is_some());
        assert_eq!(state.event_id, "evt-1");
    }

    #[test]
    fn test_out_of_order_action_is_skipped() {
        let update = table().reduce(
            &at(FunnelStep::LeadCapture),
            &VaultAction::ScanCompleted {
                result: scan_result(),
            },
        );
        assert_eq!(update, FunnelUpdate::Skip);
    }

    #[test]
    fn test_exit_intercept_returns_to_interrupted_step() {
        let state = at(FunnelStep::ProjectDetails);
        let overlay = apply(&state, VaultAction::ShowExitIntercept);
        assert_eq!(overlay.current_step, FunnelStep::ExitIntercept);
        assert_eq!(overlay.interrupted_step, Some(FunnelStep::ProjectDetails));

        let back = apply(&overlay, VaultAction::ResumeFromExit);
        assert_eq!(back.current_step, FunnelStep::ProjectDetails);
        assert_eq!(back.interrupted_step, None);
        assert_eq!(back, state);
    }

    #[test]
    fn test_exit_intercept_not_offered_on_success() {
        let update = table().reduce(&at(FunnelStep::Success), &VaultAction::ShowExitIntercept);
        assert_eq!(update, FunnelUpdate::Skip);
    }

    #[test]
    fn test_resume_from_exit_without_memory_is_skipped() {
        let update = table().reduce(&at(FunnelStep::ExitIntercept), &VaultAction::ResumeFromExit);
        assert_eq!(update, FunnelUpdate::Skip);
    }

    #[test]
    fn test_reset_from_every_step() {
        for step in FunnelStep::ALL {
            let next = apply(
                &at(step),
                VaultAction::Reset {
                    event_id: "evt-2".to_string(),
                },
            );
            assert_eq!(next, VaultReducerState::fresh("evt-2".to_string()));
        }
    }

    #[test]
    fn test_skip_leaves_state_unchanged() {
        let state = at(FunnelStep::Success);
        let next = table()
            .reduce(&state, &VaultAction::ConfirmVault)
            .into_state(&state);
        assert_eq!(next, state);
    }

    #[test]
    fn test_action_json_shape() {
        let action: VaultAction = serde_json::from_str(
            r#"{"type":"SET_LEAD_FORM","leadId":"42","data":{"name":"Dana","email":"d@x.io"}}"#,
        )
        .expect("parse action");
        assert_eq!(action.kind(), ActionKind::SetLeadForm);

        let reset: VaultAction = serde_json::from_str(r#"{"type":"RESET"}"#).expect("parse reset");
        assert_eq!(
            reset,
            VaultAction::Reset {
                event_id: String::new()
            }
        );

        let resume: VaultAction =
            serde_json::from_str(r#"{"type":"RESUME_FROM_EXIT"}"#).expect("parse resume");
        assert_eq!(resume, VaultAction::ResumeFromExit);
    }
}
