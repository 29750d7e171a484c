//! The background task runner contract.
//!
//! A runner executes one unit of work per [`TaskHandle`] off the control path
//! and reports back through [`TaskObserver`] callbacks. Within a group the
//! runner tracks a single current handle; starting another task in the same
//! group detaches the previous one.

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::{TaskHandle, TaskKind};
use crate::cancellation::CancellationToken;
use crate::errors::{FaultDescription, InstallError};

/// Messages a running task posts back to the control path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMessage {
    /// The main installation created its processing context.
    SetTaskId(String),
    /// The installer started committing files.
    CommittingFiles,
    /// The task was cancelled.
    Aborted,
    /// The task failed.
    Failed(FaultDescription),
}

/// Receives task lifecycle callbacks from a runner.
pub trait TaskObserver: Send + Sync {
    /// The task returned normally.
    fn on_finished(&self, handle: TaskHandle);

    /// The task stopped without a terminal signal (panic, forced abort,
    /// propagated cancellation).
    fn on_disappeared(&self, handle: TaskHandle);

    /// The task posted a message.
    fn on_message(&self, handle: TaskHandle, message: JobMessage);
}

/// The work a task performs once started.
pub type TaskWork =
    Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, Result<(), InstallError>> + Send>;

/// Boxes an async closure into [`TaskWork`].
pub fn task_work<F, Fut>(f: F) -> TaskWork
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), InstallError>> + Send + 'static,
{
    Box::new(move |ctx| -> BoxFuture<'static, Result<(), InstallError>> { Box::pin(f(ctx)) })
}

/// Executes named units of work in the background.
pub trait TaskRunner: Send + Sync {
    /// Starts `work` in `group` and returns its handle immediately.
    fn start(&self, kind: TaskKind, group: &str, work: TaskWork) -> TaskHandle;

    /// Returns the handle of the task currently owning `group`.
    fn handle_for(&self, group: &str) -> Option<TaskHandle>;

    /// Requests cancellation of a task.
    fn abort(&self, handle: TaskHandle);

    /// Registers an observer. Dropped observers are pruned automatically.
    fn subscribe(&self, observer: Weak<dyn TaskObserver>);
}

/// The set of observers subscribed to a runner.
#[derive(Default)]
pub struct TaskObservers {
    observers: RwLock<Vec<Weak<dyn TaskObserver>>>,
}

impl TaskObservers {
    /// Creates an empty observer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer.
    pub fn subscribe(&self, observer: Weak<dyn TaskObserver>) {
        self.observers.write().push(observer);
    }

    /// Returns the number of live observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().iter().filter(|o| o.strong_count() > 0).count()
    }

    /// Returns true if no observer is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes `f` on every live observer, outside the set's lock.
    pub fn notify<F>(&self, f: F)
    where
        F: Fn(&dyn TaskObserver),
    {
        let live: Vec<Arc<dyn TaskObserver>> = {
            let mut observers = self.observers.write();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for observer in live {
            f(observer.as_ref());
        }
    }
}

impl std::fmt::Debug for TaskObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskObservers")
            .field("len", &self.len())
            .finish()
    }
}

/// Per-task context handed to the work when it starts.
#[derive(Clone)]
pub struct TaskContext {
    handle: TaskHandle,
    kind: TaskKind,
    token: Arc<CancellationToken>,
    shutting_down: Arc<AtomicBool>,
    observers: Arc<TaskObservers>,
}

impl TaskContext {
    /// Creates a task context.
    #[must_use]
    pub fn new(
        handle: TaskHandle,
        kind: TaskKind,
        token: Arc<CancellationToken>,
        shutting_down: Arc<AtomicBool>,
        observers: Arc<TaskObservers>,
    ) -> Self {
        Self {
            handle,
            kind,
            token,
            shutting_down,
            observers,
        }
    }

    /// Returns the task's handle.
    #[must_use]
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// Returns the task's kind.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Returns the task's cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns whether the owning runner is shutting down.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Posts a message to the control path.
    pub fn post(&self, message: JobMessage) {
        let handle = self.handle;
        self.observers
            .notify(|observer| observer.on_message(handle, message.clone()));
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
