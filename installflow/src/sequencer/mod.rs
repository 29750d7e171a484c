//! Sequencing of one installation attempt.
//!
//! The [`StepSequencer`] runs the main installation, waits for the file
//! commit, installs security accounts and finally runs the package's post
//! action, each as a background task on a [`TaskRunner`](crate::runner::TaskRunner).

mod machine;
mod request;
mod work;


pub use machine::StepSequencer;
pub use request::{resolve_post_action_target, InstallRequest};
