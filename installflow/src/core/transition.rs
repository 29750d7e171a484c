//! The installation transition table.
//!
//! [`transition`] is pure: it maps the current step and an incoming event to
//! the next step and the action the sequencer must carry out. The sequencer
//! evaluates it under its state lock.

use super::{InstallationResult, InstallationStep, StepOutcome};
use crate::errors::FaultDescription;

/// An event delivered to the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    /// The current task ran to completion.
    TaskFinished,
    /// The current task vanished without a terminal signal.
    TaskDisappeared,
    /// The installer announced that files are being committed.
    CommittingFiles,
    /// Explicit abort.
    Abort,
    /// Explicit failure with error detail.
    Failure(FaultDescription),
}

impl From<StepOutcome> for SequencerEvent {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Finished => Self::TaskFinished,
            StepOutcome::Disappeared => Self::TaskDisappeared,
            StepOutcome::Failed(fault) => Self::Failure(fault),
        }
    }
}

/// Work the sequencer performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Nothing to do.
    None,
    /// Start the file-commit watch task.
    StartWatch,
    /// Start the security-install task.
    StartSecurity,
    /// Start the post-action task.
    StartPostAction,
    /// Report the terminal result.
    Complete(InstallationResult),
}

/// The outcome of evaluating the transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The step after the transition.
    pub next: InstallationStep,
    /// The action to carry out.
    pub action: StepAction,
}

impl Transition {
    fn to(next: InstallationStep, action: StepAction) -> Self {
        Self { next, action }
    }

    fn stay(step: InstallationStep) -> Self {
        Self::to(step, StepAction::None)
    }

    /// Returns true if neither the step nor any work changes.
    #[must_use]
    pub fn is_noop(&self, from: InstallationStep) -> bool {
        self.next == from && self.action == StepAction::None
    }
}

/// Evaluates the transition table.
#[must_use]
pub fn transition(
    step: InstallationStep,
    event: &SequencerEvent,
    has_post_action: bool,
) -> Transition {
    use InstallationStep as S;
    use SequencerEvent as E;

    if step.is_terminal() {
        return Transition::stay(step);
    }

    match (step, event) {
        (_, E::Abort) => Transition::to(S::Failed, StepAction::Complete(InstallationResult::aborted())),
        (_, E::Failure(fault)) => Transition::to(
            S::Failed,
            StepAction::Complete(InstallationResult::from_fault(fault)),
        ),

        (S::MainInstallation, E::TaskFinished | E::CommittingFiles) => {
            Transition::to(S::WaitForFiles, StepAction::StartWatch)
        }
        (S::MainInstallation, E::TaskDisappeared) => Transition::to(
            S::Failed,
            StepAction::Complete(InstallationResult::interrupted()),
        ),

        (S::WaitForFiles, E::TaskFinished) => {
            Transition::to(S::InstallSecurity, StepAction::StartSecurity)
        }
        // The watch is restarted: the commit phase may not have begun yet.
        (S::WaitForFiles, E::TaskDisappeared) => {
            Transition::to(S::WaitForFiles, StepAction::StartWatch)
        }

        // Disappearance here counts as completion.
        (S::InstallSecurity, E::TaskFinished | E::TaskDisappeared) => {
            if has_post_action {
                Transition::to(S::RunPostAction, StepAction::StartPostAction)
            } else {
                Transition::to(S::Done, StepAction::Complete(InstallationResult::success()))
            }
        }

        (S::RunPostAction, E::TaskFinished | E::TaskDisappeared) => {
            Transition::to(S::Done, StepAction::Complete(InstallationResult::success()))
        }

        _ => Transition::stay(step),
    }
}
