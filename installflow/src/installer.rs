//! The installer collaborator contract.
//!
//! The installer performs the actual item, file and security installation.
//! It is not part of this crate; the sequencer invokes each operation exactly
//! once per corresponding step from inside a background task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::runner::TaskContext;

/// Descriptive metadata carried by a package.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMetadata {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Package author.
    pub author: String,
    /// Package publisher.
    pub publisher: String,
    /// License text, empty when the package has none.
    pub license: String,
    /// Readme text, empty when the package has none.
    pub readme: String,
    /// Post-install action, empty when the package has none.
    pub post_action: String,
    /// Version of the installer that wrote the package, when it recorded one.
    pub installer_version: Option<String>,
    /// Package format version, derived on load by
    /// [`PackageMetadata::derived_format_version`].
    pub format_version: u32,
}

impl PackageMetadata {
    /// Returns 2 for packages written by an installer that records its own
    /// version, 1 otherwise.
    #[must_use]
    pub fn derived_format_version(&self) -> u32 {
        match self.installer_version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => 2,
            _ => 1,
        }
    }
}

/// State shared by the installer across the operations of one step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessingContext {
    /// Identifier of the installation task; names its status record.
    pub task_id: String,
    /// Package metadata, attached for the post-install step.
    pub metadata: Option<PackageMetadata>,
}

impl ProcessingContext {
    /// Creates a context for a task.
    #[must_use]
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            metadata: None,
        }
    }

    /// Attaches package metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Performs the installation work of each step.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Creates a fresh processing context.
    fn create_context(&self) -> anyhow::Result<ProcessingContext>;

    /// Installs items and files. Posts
    /// [`JobMessage::CommittingFiles`](crate::runner::JobMessage::CommittingFiles)
    /// through `job` once files start being committed.
    async fn run_main_install(
        &self,
        package: &Path,
        context: &ProcessingContext,
        job: &TaskContext,
    ) -> anyhow::Result<()>;

    /// Installs security accounts.
    async fn run_security_install(
        &self,
        package: &Path,
        context: &ProcessingContext,
    ) -> anyhow::Result<()>;

    /// Runs the post-install action against its resolved target.
    async fn run_post_step(&self, action: &str, context: &ProcessingContext) -> anyhow::Result<()>;
}
