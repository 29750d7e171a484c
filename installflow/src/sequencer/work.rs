//! The units of work the sequencer hands to the task runner.
//!
//! Each builder wraps its work in [`catch_faults`] so that every fault is
//! converted into a job message at the task boundary.

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::InstallError;
use crate::installer::{Installer, PackageMetadata};
use crate::runner::{catch_faults, task_work, JobMessage, TaskWork};
use crate::status::StatusPoller;

/// Installs items and files, reporting the processing task id first.
pub(super) fn main_install(installer: Arc<dyn Installer>, package: PathBuf) -> TaskWork {
    task_work(move |ctx| async move {
        catch_faults(&ctx, async {
            let context = installer
                .create_context()
                .map_err(InstallError::from_collaborator)?;
            ctx.post(JobMessage::SetTaskId(context.task_id.clone()));
            installer
                .run_main_install(&package, &context, &ctx)
                .await
                .map_err(InstallError::from_collaborator)
        })
        .await
    })
}

/// Waits for the file-commit status record at `location`.
pub(super) fn watch_status(poller: StatusPoller, location: Option<PathBuf>) -> TaskWork {
    task_work(move |ctx| async move {
        catch_faults(&ctx, async {
            let location = location.ok_or(InstallError::StatusFileNotSet)?;
            poller.watch(&location, ctx.token()).await
        })
        .await
    })
}

/// Installs security accounts.
pub(super) fn install_security(installer: Arc<dyn Installer>, package: PathBuf) -> TaskWork {
    task_work(move |ctx| async move {
        catch_faults(&ctx, async {
            let context = installer
                .create_context()
                .map_err(InstallError::from_collaborator)?;
            installer
                .run_security_install(&package, &context)
                .await
                .map_err(InstallError::from_collaborator)
        })
        .await
    })
}

/// Runs the post-install action with a context carrying the package metadata.
pub(super) fn post_action(
    installer: Arc<dyn Installer>,
    target: String,
    metadata: PackageMetadata,
) -> TaskWork {
    task_work(move |ctx| async move {
        catch_faults(&ctx, async {
            let context = installer
                .create_context()
                .map_err(InstallError::from_collaborator)?
                .with_metadata(metadata);
            installer
                .run_post_step(&target, &context)
                .await
                .map_err(InstallError::from_collaborator)
        })
        .await
    })
}
