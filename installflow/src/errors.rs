//! Error types for the installflow orchestrator.
//!
//! Collaborator faults arrive as [`anyhow::Error`] and are wrapped in
//! [`InstallError::Collaborator`]. Every fault raised inside a background task
//! is classified into a [`FaultKind`] at the task boundary and rendered into a
//! [`FaultDescription`] before it reaches the sequencer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Marker that separates the human readable part of a fault message from
/// machine detail appended by the installer.
pub const MACHINE_DETAIL_MARKER: &str = "(method:";

/// The main error type for installflow operations.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The running task was asked to stop cooperatively.
    #[error("Installation cancelled: {0}")]
    Cancelled(String),

    /// The file-commit subsystem reported a failure in its status record.
    #[error("Background process failed: {0}")]
    BackgroundProcess(String),

    /// The file-commit watch was started before the main task reported its id.
    #[error("Internal error: status file not set.")]
    StatusFileNotSet,

    /// The package could not be located or loaded.
    #[error("{0}")]
    Package(#[from] PackageError),

    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A fault raised by the installer collaborator.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl InstallError {
    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Converts a collaborator fault, recovering an `InstallError` the
    /// collaborator wrapped itself (for example a cancellation it observed).
    #[must_use]
    pub fn from_collaborator(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(inner) => inner,
            Err(other) => Self::Collaborator(other),
        }
    }

    /// Returns true if this error represents a cooperative cancellation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Classifies the error for the task boundary.
    #[must_use]
    pub fn kind(&self) -> FaultKind {
        if self.is_cancellation() {
            FaultKind::CooperativeAbort
        } else {
            FaultKind::TerminalFault
        }
    }
}

/// Errors raised while resolving a package before installation.
#[derive(Debug, Error)]
pub enum PackageError {
    /// No package path was given.
    #[error("Please specify a package.")]
    NotSpecified,

    /// The name given for a package to build is empty or not a valid file
    /// name.
    #[error("Enter a valid name for the package.")]
    InvalidName,

    /// The package file does not exist.
    #[error("The package \"{}\" file does not exist.", .0.display())]
    NotFound(PathBuf),

    /// The metadata reader could not load the package.
    #[error("The package \"{}\" could not be loaded. The file may be corrupt.", path.display())]
    Unreadable {
        /// The package path.
        path: PathBuf,
        /// The underlying reader error.
        #[source]
        source: anyhow::Error,
    },
}

/// Classification of faults observed while running an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The worker vanished without signaling a terminal outcome.
    TransientDisappearance,
    /// The worker reported a real error.
    TerminalFault,
    /// User or system initiated cancellation.
    CooperativeAbort,
    /// A step tried to start work while another task was in flight.
    ReentrantStartAttempt,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientDisappearance => write!(f, "transient_disappearance"),
            Self::TerminalFault => write!(f, "terminal_fault"),
            Self::CooperativeAbort => write!(f, "cooperative_abort"),
            Self::ReentrantStartAttempt => write!(f, "reentrant_start_attempt"),
        }
    }
}

/// Short and full descriptions of a fault, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaultDescription {
    /// Human readable summary.
    pub short: String,
    /// Complete diagnostic detail.
    pub full: String,
}

impl FaultDescription {
    /// Creates a description from explicit parts.
    #[must_use]
    pub fn new(short: impl Into<String>, full: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            full: full.into(),
        }
    }

    /// Describes an error: the short form is its top-level message trimmed at
    /// the machine detail marker, the full form is the whole source chain.
    #[must_use]
    pub fn from_error(error: &InstallError) -> Self {
        let message = error.to_string();
        let mut full = message.clone();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !full.contains(&text) {
                full.push_str("\n  caused by: ");
                full.push_str(&text);
            }
            source = cause.source();
        }

        Self {
            short: short_description(&message),
            full,
        }
    }
}

impl fmt::Display for FaultDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short)
    }
}

/// Returns the text preceding the machine detail marker, without the
/// separator character in front of it. Messages without the marker are
/// returned whole.
#[must_use]
pub fn short_description(message: &str) -> String {
    match message.find(MACHINE_DETAIL_MARKER) {
        Some(index) => {
            let head = &message[..index];
            let mut chars = head.chars();
            chars.next_back();
            chars.as_str().to_string()
        }
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_description_without_marker() {
        assert_eq!(short_description("Disk full"), "Disk full");
    }

    #[test]
    fn test_short_description_trims_marker() {
        let message = "Item could not be saved (method: Data.Items.Save)";
        assert_eq!(short_description(message), "Item could not be saved");
    }

    #[test]
    fn test_short_description_marker_at_start() {
        assert_eq!(short_description("(method: X)"), "");
    }

    #[test]
    fn test_fault_description_from_collaborator_error() {
        let inner = anyhow::anyhow!("connection reset").context("Unable to write item (method: Save)");
        let err = InstallError::from(inner);
        let description = FaultDescription::from_error(&err);

        assert_eq!(description.short, "Unable to write item");
        assert!(description.full.contains("(method: Save)"));
        assert!(description.full.contains("connection reset"));
    }

    #[test]
    fn test_from_collaborator_recovers_cancellation() {
        let wrapped = anyhow::Error::new(InstallError::cancelled("observed by installer"));
        assert!(InstallError::from_collaborator(wrapped).is_cancellation());

        let plain = anyhow::anyhow!("boom");
        assert!(matches!(
            InstallError::from_collaborator(plain),
            InstallError::Collaborator(_)
        ));
    }

    #[test]
    fn test_background_process_message() {
        let err = InstallError::BackgroundProcess("locked file".to_string());
        assert_eq!(err.to_string(), "Background process failed: locked file");
        assert_eq!(err.kind(), FaultKind::TerminalFault);
    }

    #[test]
    fn test_cancellation_kind() {
        let err = InstallError::cancelled("user");
        assert!(err.is_cancellation());
        assert_eq!(err.kind(), FaultKind::CooperativeAbort);
    }

    #[test]
    fn test_package_error_messages() {
        let err = PackageError::NotFound(PathBuf::from("/tmp/missing.zip"));
        assert_eq!(err.to_string(), "The package \"/tmp/missing.zip\" file does not exist.");
        assert_eq!(PackageError::NotSpecified.to_string(), "Please specify a package.");
    }

    #[test]
    fn test_fault_kind_display() {
        assert_eq!(FaultKind::ReentrantStartAttempt.to_string(), "reentrant_start_attempt");
        assert_eq!(FaultKind::TransientDisappearance.to_string(), "transient_disappearance");
    }
}
