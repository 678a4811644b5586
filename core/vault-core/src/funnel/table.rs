//! Explicit `step × action → target` table for the funnel.
//!
//! ```text
//! lead_capture ─SetLeadForm─► pivot_question ─SetPivotAnswer─┬─ yes ─► scanner_upload
//!                                                            └─ no ──► final_escalation
//! scanner_upload ─StartScan─► analysis_theater ─ScanCompleted─► result_display
//! result_display ─ContinueFromResult─► vault_confirmation ─ConfirmVault─► project_details
//! project_details ─SetProjectDetails─► final_escalation ─SetEscalation─► success
//!
//! any step but lead_capture/success ─ShowExitIntercept─► exit_intercept
//! exit_intercept ─ResumeFromExit─► <interrupted step>
//! any step ─Reset─► lead_capture (new event id)
//! ```
//!
//! The table is checked once when built; a table that breaks any structural
//! rule never reaches the reducer.

use std::collections::{BTreeMap, BTreeSet};

use crate::session::FunnelStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    SetLeadForm,
    SetPivotAnswer,
    StartScan,
    ScanCompleted,
    ContinueFromResult,
    ConfirmVault,
    SetProjectDetails,
    SetEscalation,
    ShowExitIntercept,
    ResumeFromExit,
    Reset,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::SetLeadForm,
        ActionKind::SetPivotAnswer,
        ActionKind::StartScan,
        ActionKind::ScanCompleted,
        ActionKind::ContinueFromResult,
        ActionKind::ConfirmVault,
        ActionKind::SetProjectDetails,
        ActionKind::SetEscalation,
        ActionKind::ShowExitIntercept,
        ActionKind::ResumeFromExit,
        ActionKind::Reset,
    ];
}

/// Where an edge leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Step(FunnelStep),
    /// `scanner_upload` on yes, `final_escalation` on no.
    Branch,
    /// Open the exit overlay, remembering the current step.
    Overlay,
    /// Back to the step the overlay interrupted.
    Interrupted,
    /// Fresh session on `lead_capture`.
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("{0} has no Reset edge")]
    MissingReset(FunnelStep),
    #[error("{0} must allow the exit overlay")]
    MissingInterrupt(FunnelStep),
    #[error("{0} must not allow the exit overlay")]
    UnexpectedInterrupt(FunnelStep),
    #[error("{step} has an edge for {action:?} that is not allowed there")]
    IllegalEdge { step: FunnelStep, action: ActionKind },
    #[error("{0} is a dead end")]
    DeadEnd(FunnelStep),
    #[error("{0} is unreachable from lead_capture")]
    Unreachable(FunnelStep),
}

#[derive(Debug, Clone)]
pub struct TransitionTable {
    edges: BTreeMap<(FunnelStep, ActionKind), Target>,
}

impl TransitionTable {
    /// The production funnel.
    pub fn standard() -> Result<Self, TableError> {
        use ActionKind as A;
        use FunnelStep as S;

        let mut edges = BTreeMap::new();
        let forward = [
            (S::LeadCapture, A::SetLeadForm, Target::Step(S::PivotQuestion)),
            (S::PivotQuestion, A::SetPivotAnswer, Target::Branch),
            (S::ScannerUpload, A::StartScan, Target::Step(S::AnalysisTheater)),
            (S::AnalysisTheater, A::ScanCompleted, Target::Step(S::ResultDisplay)),
            (
                S::ResultDisplay,
                A::ContinueFromResult,
                Target::Step(S::VaultConfirmation),
            ),
            (
                S::VaultConfirmation,
                A::ConfirmVault,
                Target::Step(S::ProjectDetails),
            ),
            (
                S::ProjectDetails,
                A::SetProjectDetails,
                Target::Step(S::FinalEscalation),
            ),
            (S::FinalEscalation, A::SetEscalation, Target::Step(S::Success)),
            (S::ExitIntercept, A::ResumeFromExit, Target::Interrupted),
        ];
        for (step, action, target) in forward {
            edges.insert((step, action), target);
        }
        for step in FunnelStep::ALL {
            if step.can_be_interrupted() {
                edges.insert((step, A::ShowExitIntercept), Target::Overlay);
            }
            edges.insert((step, A::Reset), Target::Restart);
        }

        Self::from_edges(edges)
    }

    /// Builds a table from raw edges, rejecting any that break funnel rules.
    pub fn from_edges(
        edges: BTreeMap<(FunnelStep, ActionKind), Target>,
    ) -> Result<Self, TableError> {
        let table = TransitionTable { edges };
        table.validate()?;
        Ok(table)
    }

    pub fn lookup(&self, step: FunnelStep, action: ActionKind) -> Option<Target> {
        self.edges.get(&(step, action)).copied()
    }

    /// Actions with an edge out of `step`.
    pub fn actions_from(&self, step: FunnelStep) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|action| self.edges.contains_key(&(step, *action)))
            .collect()
    }

    fn validate(&self) -> Result<(), TableError> {
        for step in FunnelStep::ALL {
            if self.lookup(step, ActionKind::Reset) != Some(Target::Restart) {
                return Err(TableError::MissingReset(step));
            }

            let interrupt = self.lookup(step, ActionKind::ShowExitIntercept);
            match (step.can_be_interrupted(), interrupt) {
                (true, Some(Target::Overlay)) | (false, None) => {}
                (true, _) => return Err(TableError::MissingInterrupt(step)),
                (false, Some(_)) => return Err(TableError::UnexpectedInterrupt(step)),
            }

            let onward = self
                .actions_from(step)
                .into_iter()
                .filter(|action| {
                    !matches!(action, ActionKind::Reset | ActionKind::ShowExitIntercept)
                })
                .count();
            if step == FunnelStep::Success && onward > 0 {
                return Err(TableError::IllegalEdge {
                    step,
                    action: self.actions_from(step)[0],
                });
            }
            if step != FunnelStep::Success && onward == 0 {
                return Err(TableError::DeadEnd(step));
            }
        }

        for (&(step, action), &target) in &self.edges {
            let allowed = match target {
                Target::Restart => action == ActionKind::Reset,
                Target::Overlay => action == ActionKind::ShowExitIntercept,
                Target::Interrupted => {
                    step == FunnelStep::ExitIntercept && action == ActionKind::ResumeFromExit
                }
                Target::Branch => {
                    step == FunnelStep::PivotQuestion && action == ActionKind::SetPivotAnswer
                }
                Target::Step(next) => {
                    next != FunnelStep::ExitIntercept
                        && !matches!(action, ActionKind::Reset | ActionKind::ShowExitIntercept)
                }
            };
            if !allowed {
                return Err(TableError::IllegalEdge { step, action });
            }
        }

        let reachable = self.reachable_from(FunnelStep::LeadCapture);
        for step in FunnelStep::ALL {
            if !reachable.contains(&step) {
                return Err(TableError::Unreachable(step));
            }
        }

        Ok(())
    }

    fn reachable_from(&self, start: FunnelStep) -> BTreeSet<FunnelStep> {
        let mut seen = BTreeSet::from([start]);
        let mut frontier = vec![start];
        while let Some(step) = frontier.pop() {
            for action in self.actions_from(step) {
                let next = match self.lookup(step, action) {
                    Some(Target::Step(next)) => vec![next],
                    Some(Target::Branch) => {
                        vec![FunnelStep::ScannerUpload, FunnelStep::FinalEscalation]
                    }
                    Some(Target::Overlay) => vec![FunnelStep::ExitIntercept],
                    Some(Target::Restart) => vec![FunnelStep::LeadCapture],
                    // Only returns to a step that was already reached.
                    Some(Target::Interrupted) | None => Vec::new(),
                };
                for candidate in next {
                    if seen.insert(candidate) {
                        frontier.push(candidate);
                    }
                }
            }
        }
        seen
    }
}
