//! Fault conversion at the task boundary.
//!
//! Every fault raised by a task's work is caught here and turned into a
//! [`JobMessage`] before it reaches the sequencer.

use std::future::Future;
use tracing::{error, info};

use super::{JobMessage, TaskContext};
use crate::errors::{FaultDescription, InstallError};

/// Runs `work`, racing it against the task's cancellation token.
///
/// - Success returns `Ok(())`.
/// - Cancellation posts [`JobMessage::Aborted`] and is suppressed, unless the
///   runner is shutting down, in which case it is returned as an error.
/// - Any other error is logged and posted as [`JobMessage::Failed`].
pub async fn catch_faults<F>(ctx: &TaskContext, work: F) -> Result<(), InstallError>
where
    F: Future<Output = Result<(), InstallError>> + Send,
{
    let outcome = tokio::select! {
        biased;
        () = ctx.token().cancelled() => Err(InstallError::cancelled(
            ctx.token().reason().unwrap_or_default(),
        )),
        result = work => result,
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(err) if err.is_cancellation() => {
            info!(task = %ctx.kind(), handle = %ctx.handle(), "Installation was aborted");
            ctx.post(JobMessage::Aborted);
            if ctx.is_shutting_down() {
                Err(err)
            } else {
                Ok(())
            }
        }
        Err(err) => {
            let fault = FaultDescription::from_error(&err);
            error!(
                task = %ctx.kind(),
                handle = %ctx.handle(),
                kind = %err.kind(),
                error = %fault.full,
                "Installation failed"
            );
            ctx.post(JobMessage::Failed(fault));
            Ok(())
        }
    }
}
