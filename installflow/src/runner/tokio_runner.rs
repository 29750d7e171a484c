//! A task runner backed by the tokio runtime.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use super::{TaskContext, TaskHandle, TaskKind, TaskObserver, TaskObservers, TaskRunner, TaskWork};
use crate::cancellation::CancellationToken;
use crate::config::InstallerConfig;

struct RunningTask {
    kind: TaskKind,
    token: Arc<CancellationToken>,
    abort: AbortHandle,
}

struct RunnerInner {
    tasks: DashMap<TaskHandle, RunningTask>,
    groups: DashMap<String, TaskHandle>,
    observers: Arc<TaskObservers>,
    shutting_down: Arc<AtomicBool>,
    force_abort_grace: Duration,
    runtime: Handle,
}

/// Runs each task as a tokio task and reports its end to observers.
///
/// A task that returns `Ok` is reported as finished. A task that panics, is
/// force-terminated, or returns an error is reported as disappeared. The group
/// slot is released before observers are notified.
///
/// Tasks run on the runtime the runner was created in; its methods may be
/// called from any thread.
#[derive(Clone)]
pub struct TokioTaskRunner {
    inner: Arc<RunnerInner>,
}

impl TokioTaskRunner {
    /// Creates a runner with the given forced abort grace period.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(force_abort_grace: Duration) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                tasks: DashMap::new(),
                groups: DashMap::new(),
                observers: Arc::new(TaskObservers::new()),
                shutting_down: Arc::new(AtomicBool::new(false)),
                force_abort_grace,
                runtime: Handle::current(),
            }),
        }
    }

    /// Creates a runner from configuration.
    #[must_use]
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(config.force_abort_grace())
    }

    /// Returns the number of tasks still running, detached ones included.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Marks the runner as shutting down and cancels every running task.
    ///
    /// Cancellations observed after this point are propagated out of the
    /// task rather than suppressed.
    pub fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        for entry in &self.inner.tasks {
            entry.token.cancel("Runner shutting down");
        }
        info!(tasks = self.inner.tasks.len(), "Task runner shutting down");
    }
}

impl std::fmt::Debug for TokioTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioTaskRunner")
            .field("running", &self.running_count())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl TaskRunner for TokioTaskRunner {
    fn start(&self, kind: TaskKind, group: &str, work: TaskWork) -> TaskHandle {
        let handle = TaskHandle::new();
        let token = Arc::new(CancellationToken::new());
        let ctx = TaskContext::new(
            handle,
            kind,
            token.clone(),
            self.inner.shutting_down.clone(),
            self.inner.observers.clone(),
        );

        let join = self.inner.runtime.spawn(work(ctx));
        self.inner.tasks.insert(
            handle,
            RunningTask {
                kind,
                token,
                abort: join.abort_handle(),
            },
        );
        if let Some(previous) = self.inner.groups.insert(group.to_string(), handle) {
            warn!(group, %previous, "Detaching task superseded in its group");
        }
        debug!(task = %kind, group, %handle, "Task started");

        let inner = self.inner.clone();
        let group = group.to_string();
        self.inner.runtime.spawn(async move {
            let result = join.await;
            inner.tasks.remove(&handle);
            inner.groups.remove_if(&group, |_, owner| *owner == handle);

            match result {
                Ok(Ok(())) => {
                    debug!(task = %kind, %handle, "Task finished");
                    inner.observers.notify(|o| o.on_finished(handle));
                }
                Ok(Err(e)) => {
                    error!(task = %kind, %handle, error = %e, "Task terminated with an error");
                    inner.observers.notify(|o| o.on_disappeared(handle));
                }
                Err(join_error) => {
                    if join_error.is_cancelled() {
                        warn!(task = %kind, %handle, "Task was force-terminated");
                    } else {
                        error!(task = %kind, %handle, "Task panicked");
                    }
                    inner.observers.notify(|o| o.on_disappeared(handle));
                }
            }
        });

        handle
    }

    fn handle_for(&self, group: &str) -> Option<TaskHandle> {
        self.inner.groups.get(group).map(|entry| *entry.value())
    }

    fn abort(&self, handle: TaskHandle) {
        let Some(kind) = self.inner.tasks.get(&handle).map(|entry| {
            entry.token.cancel("Installation aborted");
            entry.kind
        }) else {
            debug!(%handle, "Abort requested for a task that is not running");
            return;
        };
        info!(task = %kind, %handle, "Abort requested");

        let inner = self.inner.clone();
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(inner.force_abort_grace).await;
            if let Some(entry) = inner.tasks.get(&handle) {
                warn!(task = %entry.kind, %handle, "Task ignored cancellation; forcing abort");
                entry.abort.abort();
            }
        });
    }

    fn subscribe(&self, observer: Weak<dyn TaskObserver>) {
        self.inner.observers.subscribe(observer);
    }
}
