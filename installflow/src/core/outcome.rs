//! Task outcomes and the terminal installation result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::FaultDescription;

/// Short reason reported when the main installation task vanishes.
pub const INTERRUPTED_SHORT_REASON: &str = "installation job interrupted unexpectedly";

/// Full reason reported when the main installation task vanishes.
pub const INTERRUPTED_FULL_REASON: &str = "Installation job was interrupted unexpectedly.";

/// The result fed back from a delegated task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The task ran to completion.
    Finished,
    /// The task stopped without signaling a terminal outcome.
    Disappeared,
    /// The task reported an error.
    Failed(FaultDescription),
}

/// How an installation attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Every step completed.
    Success,
    /// A step failed.
    Failure,
    /// The installation was cancelled.
    Aborted,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Terminal result of an installation attempt, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResult {
    /// How the attempt ended.
    pub outcome: ResultKind,
    /// Human readable summary, empty on success and abort.
    pub short_reason: String,
    /// Full diagnostic description, empty on success and abort.
    pub full_reason: String,
    /// When the result was produced.
    pub completed_at: DateTime<Utc>,
}

impl InstallationResult {
    fn new(outcome: ResultKind, short_reason: String, full_reason: String) -> Self {
        Self {
            outcome,
            short_reason,
            full_reason,
            completed_at: Utc::now(),
        }
    }

    /// Creates a success result.
    #[must_use]
    pub fn success() -> Self {
        Self::new(ResultKind::Success, String::new(), String::new())
    }

    /// Creates an aborted result.
    #[must_use]
    pub fn aborted() -> Self {
        Self::new(ResultKind::Aborted, String::new(), String::new())
    }

    /// Creates a failure result.
    #[must_use]
    pub fn failure(short_reason: impl Into<String>, full_reason: impl Into<String>) -> Self {
        Self::new(ResultKind::Failure, short_reason.into(), full_reason.into())
    }

    /// Creates a failure result from a fault description.
    #[must_use]
    pub fn from_fault(fault: &FaultDescription) -> Self {
        Self::failure(fault.short.clone(), fault.full.clone())
    }

    /// Failure reported when the main installation task vanished.
    #[must_use]
    pub fn interrupted() -> Self {
        Self::failure(INTERRUPTED_SHORT_REASON, INTERRUPTED_FULL_REASON)
    }

    /// Returns true if the installation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == ResultKind::Success
    }

    /// Converts to a JSON value for event payloads.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "outcome": self.outcome.to_string(),
            "short_reason": self.short_reason,
            "full_reason": self.full_reason,
            "completed_at": self.completed_at.to_rfc3339(),
        })
    }
}
