//! Installation step enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A phase of the installation process.
///
/// Steps only move forward, except for `WaitForFiles` which is re-entered
/// when its watch task disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStep {
    /// Installing items and files.
    #[default]
    MainInstallation,
    /// Waiting for the file-commit subsystem to finish.
    WaitForFiles,
    /// Installing security accounts.
    InstallSecurity,
    /// Running the package's post-install action.
    RunPostAction,
    /// Finished successfully.
    Done,
    /// Failed or aborted.
    Failed,
}

impl fmt::Display for InstallationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainInstallation => write!(f, "main_installation"),
            Self::WaitForFiles => write!(f, "wait_for_files"),
            Self::InstallSecurity => write!(f, "install_security"),
            Self::RunPostAction => write!(f, "run_post_action"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl InstallationStep {
    /// Returns true if no further transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
