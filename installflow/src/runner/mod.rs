//! Background task execution.
//!
//! This module provides:
//! - The [`TaskRunner`] contract and its [`TaskObserver`] callbacks
//! - [`catch_faults`], which converts task faults into [`JobMessage`]s
//! - [`TokioTaskRunner`], a runner backed by the tokio runtime

mod boundary;
mod contract;
mod handle;
mod tokio_runner;

pub use boundary::catch_faults;
pub use contract::{
    task_work, JobMessage, TaskContext, TaskObserver, TaskObservers, TaskRunner, TaskWork,
};
pub use handle::{TaskHandle, TaskKind};
pub use tokio_runner::TokioTaskRunner;
