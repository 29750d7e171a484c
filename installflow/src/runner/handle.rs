//! Task handles and task kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(Uuid);

impl TaskHandle {
    /// Creates a fresh, unique handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unit of work a background task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Main installation of items and files.
    Install,
    /// Watching the file-commit status record.
    WatchStatus,
    /// Installing security accounts.
    InstallSecurity,
    /// Running the post-install action.
    RunPostAction,
    /// Generating a package from a project definition.
    BuildPackage,
}

impl TaskKind {
    /// Returns the job name used for this kind of task.
    #[must_use]
    pub fn job_name(&self) -> &'static str {
        match self {
            Self::Install => "Install",
            Self::WatchStatus => "WatchStatus",
            Self::InstallSecurity => "InstallSecurity",
            Self::RunPostAction => "RunPostAction",
            Self::BuildPackage => "BuildPackage",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.job_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        assert_ne!(TaskHandle::new(), TaskHandle::new());
    }

    #[test]
    fn test_handle_display_is_uuid() {
        let handle = TaskHandle::new();
        assert_eq!(handle.to_string(), handle.as_uuid().to_string());
    }

    #[test]
    fn test_job_names() {
        assert_eq!(TaskKind::Install.to_string(), "Install");
        assert_eq!(TaskKind::WatchStatus.job_name(), "WatchStatus");
        assert_eq!(TaskKind::RunPostAction.job_name(), "RunPostAction");
        assert_eq!(TaskKind::BuildPackage.job_name(), "BuildPackage");
    }
}
