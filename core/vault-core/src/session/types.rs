//! Serialized session types for the funnel.
//!
//! Field names are camelCase on disk so the record stays readable by the web
//! client that shares the storage slot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use vault_protocol::{
    EscalationFormData, FileMetadata, LeadFormData, PivotAnswer, PivotFormData,
    ProjectDetailsFormData, ScanResult,
};

use crate::error::{Result, VaultError};

/// Sessions older than this are expired and never resumed.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStep {
    LeadCapture,
    PivotQuestion,
    ScannerUpload,
    AnalysisTheater,
    ResultDisplay,
    VaultConfirmation,
    ProjectDetails,
    FinalEscalation,
    Success,
    ExitIntercept,
}

impl FunnelStep {
    pub const ALL: [FunnelStep; 10] = [
        FunnelStep::LeadCapture,
        FunnelStep::PivotQuestion,
        FunnelStep::ScannerUpload,
        FunnelStep::AnalysisTheater,
        FunnelStep::ResultDisplay,
        FunnelStep::VaultConfirmation,
        FunnelStep::ProjectDetails,
        FunnelStep::FinalEscalation,
        FunnelStep::Success,
        FunnelStep::ExitIntercept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStep::LeadCapture => "lead_capture",
            FunnelStep::PivotQuestion => "pivot_question",
            FunnelStep::ScannerUpload => "scanner_upload",
            FunnelStep::AnalysisTheater => "analysis_theater",
            FunnelStep::ResultDisplay => "result_display",
            FunnelStep::VaultConfirmation => "vault_confirmation",
            FunnelStep::ProjectDetails => "project_details",
            FunnelStep::FinalEscalation => "final_escalation",
            FunnelStep::Success => "success",
            FunnelStep::ExitIntercept => "exit_intercept",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        FunnelStep::ALL
            .into_iter()
            .find(|step| step.as_str() == value)
    }

    /// Steps where the exit overlay may open.
    pub fn can_be_interrupted(&self) -> bool {
        !matches!(
            self,
            FunnelStep::LeadCapture | FunnelStep::Success | FunnelStep::ExitIntercept
        )
    }

    /// Whether a restored session sitting on this step is worth resuming.
    pub fn offers_resume(&self) -> bool {
        !matches!(self, FunnelStep::LeadCapture | FunnelStep::Success)
    }
}

impl std::fmt::Display for FunnelStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchChoice {
    Yes,
    No,
    #[default]
    Unset,
}

impl From<PivotAnswer> for BranchChoice {
    fn from(answer: PivotAnswer) -> Self {
        match answer {
            PivotAnswer::Yes => BranchChoice::Yes,
            PivotAnswer::No => BranchChoice::No,
        }
    }
}

/// A single step's form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "snake_case")]
pub enum StepForm {
    Lead(LeadFormData),
    Pivot(PivotFormData),
    ProjectDetails(ProjectDetailsFormData),
    Escalation(EscalationFormData),
}

impl StepForm {
    /// The funnel step that owns this form.
    pub fn step(&self) -> FunnelStep {
        match self {
            StepForm::Lead(_) => FunnelStep::LeadCapture,
            StepForm::Pivot(_) => FunnelStep::PivotQuestion,
            StepForm::ProjectDetails(_) => FunnelStep::ProjectDetails,
            StepForm::Escalation(_) => FunnelStep::FinalEscalation,
        }
    }
}

/// Latest submission per step. A revisit overwrites that step's entry only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<LeadFormData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot: Option<PivotFormData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_details: Option<ProjectDetailsFormData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationFormData>,
}

impl FormValues {
    pub fn insert(&mut self, form: StepForm) {
        match form {
            StepForm::Lead(data) => self.lead = Some(data),
            StepForm::Pivot(data) => self.pivot = Some(data),
            StepForm::ProjectDetails(data) => self.project_details = Some(data),
            StepForm::Escalation(data) => self.escalation = Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default)]
    pub lead_id: Option<String>,
    pub event_id: String,
    pub current_step: FunnelStep,
    #[serde(default)]
    pub branch_choice: BranchChoice,
    #[serde(default)]
    pub form_values: FormValues,
    #[serde(default)]
    pub scan_result: Option<ScanResult>,
    #[serde(default)]
    pub file_metadata: Option<FileMetadata>,
    /// Step the exit overlay interrupted, while it is open.
    #[serde(default)]
    pub interrupted_step: Option<FunnelStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A brand-new session on the first step with a newly minted event id.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        SessionRecord {
            lead_id: None,
            event_id: new_event_id(),
            current_step: FunnelStep::LeadCapture,
            branch_choice: BranchChoice::Unset,
            form_values: FormValues::default(),
            scan_result: None,
            file_metadata: None,
            interrupted_step: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the session is older than `max_age` (strictly).
    pub fn is_expired_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.created_at) > max_age
    }

    /// Applies `patch` to a copy of this record.
    ///
    /// Fails without touching anything if the patch would replace an
    /// already-assigned lead id.
    pub fn merged(&self, patch: &SessionPatch, now: DateTime<Utc>) -> Result<SessionRecord> {
        let mut next = self.clone();

        if let Some(lead_id) = &patch.lead_id {
            match &self.lead_id {
                Some(existing) if existing != lead_id => {
                    return Err(VaultError::LeadIdImmutable {
                        existing: existing.clone(),
                        attempted: lead_id.clone(),
                    });
                }
                _ => next.lead_id = Some(lead_id.clone()),
            }
        }
        if let Some(step) = patch.current_step {
            next.current_step = step;
        }
        if let Some(choice) = patch.branch_choice {
            next.branch_choice = choice;
        }
        for form in &patch.forms {
            next.form_values.insert(form.clone());
        }
        if let Some(scan) = &patch.scan_result {
            next.scan_result = Some(scan.clone());
        }
        if let Some(file) = &patch.file_metadata {
            next.file_metadata = Some(file.clone());
        }
        if let Some(interrupted) = patch.interrupted_step {
            next.interrupted_step = interrupted;
        }
        next.updated_at = now;

        Ok(next)
    }
}

/// Partial update for [`SessionRecord`]. `None` leaves the field alone.
///
/// `lead_id`, `event_id` and `created_at` cannot be cleared through a patch;
/// only a start-over replaces them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub lead_id: Option<String>,
    pub current_step: Option<FunnelStep>,
    pub branch_choice: Option<BranchChoice>,
    pub forms: Vec<StepForm>,
    pub scan_result: Option<ScanResult>,
    pub file_metadata: Option<FileMetadata>,
    pub interrupted_step: Option<Option<FunnelStep>>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        *self == SessionPatch::default()
    }
}

fn new_event_id() -> String {
    Ulid::new().to_string()
}
