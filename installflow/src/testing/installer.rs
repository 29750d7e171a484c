//! An installer whose behaviour is scripted per step.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::installer::{Installer, ProcessingContext};
use crate::runner::{JobMessage, TaskContext};
use crate::status::{write_status_file, StatusRecord};

/// What a scripted operation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Returns `Ok`.
    Succeed,
    /// Returns an error with this message.
    Fail(String),
    /// Never returns on its own.
    Hang,
    /// Panics.
    Panic,
}

impl Script {
    pub(crate) async fn perform(&self, operation: &str) -> anyhow::Result<()> {
        match self {
            Self::Succeed => Ok(()),
            Self::Fail(message) => Err(anyhow::anyhow!("{message}")),
            Self::Hang => futures::future::pending().await,
            Self::Panic => panic!("scripted panic in {operation}"),
        }
    }
}

/// An [`Installer`] that records its calls and follows a script.
#[derive(Debug)]
pub struct ScriptedInstaller {
    task_id: String,
    main: Script,
    security: Script,
    post: Script,
    announce_commit: bool,
    status: Option<(PathBuf, StatusRecord)>,
    calls: Mutex<Vec<String>>,
    post_targets: Mutex<Vec<String>>,
    post_contexts: Mutex<Vec<ProcessingContext>>,
}

impl ScriptedInstaller {
    /// Creates an installer whose every operation succeeds.
    #[must_use]
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            main: Script::Succeed,
            security: Script::Succeed,
            post: Script::Succeed,
            announce_commit: false,
            status: None,
            calls: Mutex::new(Vec::new()),
            post_targets: Mutex::new(Vec::new()),
            post_contexts: Mutex::new(Vec::new()),
        }
    }

    /// Scripts the main installation.
    #[must_use]
    pub fn with_main(mut self, script: Script) -> Self {
        self.main = script;
        self
    }

    /// Scripts the security installation.
    #[must_use]
    pub fn with_security(mut self, script: Script) -> Self {
        self.security = script;
        self
    }

    /// Scripts the post step.
    #[must_use]
    pub fn with_post(mut self, script: Script) -> Self {
        self.post = script;
        self
    }

    /// Posts [`JobMessage::CommittingFiles`] during the main installation.
    #[must_use]
    pub fn announcing_commit(mut self) -> Self {
        self.announce_commit = true;
        self
    }

    /// Writes `record` to `location` during the main installation, after the
    /// commit announcement.
    #[must_use]
    pub fn writing_status(mut self, location: impl Into<PathBuf>, record: StatusRecord) -> Self {
        self.status = Some((location.into(), record));
        self
    }

    /// Returns the operations called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns the targets the post step ran against.
    #[must_use]
    pub fn post_targets(&self) -> Vec<String> {
        self.post_targets.lock().clone()
    }

    /// Returns the contexts the post step received.
    #[must_use]
    pub fn post_contexts(&self) -> Vec<ProcessingContext> {
        self.post_contexts.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl Installer for ScriptedInstaller {
    fn create_context(&self) -> anyhow::Result<ProcessingContext> {
        Ok(ProcessingContext::new(self.task_id.clone()))
    }

    async fn run_main_install(
        &self,
        _package: &Path,
        _context: &ProcessingContext,
        job: &TaskContext,
    ) -> anyhow::Result<()> {
        self.record("main");
        if self.announce_commit {
            job.post(JobMessage::CommittingFiles);
        }
        if let Some((location, record)) = &self.status {
            write_status_file(location, record).await?;
        }
        self.main.perform("main").await
    }

    async fn run_security_install(
        &self,
        _package: &Path,
        _context: &ProcessingContext,
    ) -> anyhow::Result<()> {
        self.record("security");
        self.security.perform("security").await
    }

    async fn run_post_step(&self, action: &str, context: &ProcessingContext) -> anyhow::Result<()> {
        self.record("post");
        self.post_targets.lock().push(action.to_string());
        self.post_contexts.lock().push(context.clone());
        self.post.perform("post").await
    }
}
