//! Core domain model types for installflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The installation step enum
//! - Task outcomes and the terminal installation result
//! - The pure transition table

mod outcome;
mod step;
mod transition;

pub use outcome::{
    InstallationResult, ResultKind, StepOutcome, INTERRUPTED_FULL_REASON,
    INTERRUPTED_SHORT_REASON,
};
pub use step::InstallationStep;
pub use transition::{transition, SequencerEvent, StepAction, Transition};
