//! A task runner driven by hand from tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};

use crate::cancellation::CancellationToken;
use crate::errors::InstallError;
use crate::runner::{
    JobMessage, TaskContext, TaskHandle, TaskKind, TaskObserver, TaskObservers, TaskRunner,
    TaskWork,
};

/// A start recorded by [`ManualTaskRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedTask {
    /// What the task does.
    pub kind: TaskKind,
    /// The group it was started in.
    pub group: String,
    /// Its handle.
    pub handle: TaskHandle,
}

struct PendingTask {
    kind: TaskKind,
    work: TaskWork,
    token: Arc<CancellationToken>,
}

/// A runner that never runs anything on its own.
///
/// Tests decide when a task finishes, disappears or posts a message. Like a
/// real runner, the group slot is released before observers hear about the
/// end of a task.
#[derive(Default)]
pub struct ManualTaskRunner {
    started: Mutex<Vec<StartedTask>>,
    pending: Mutex<HashMap<TaskHandle, PendingTask>>,
    groups: Mutex<HashMap<String, TaskHandle>>,
    aborted: Mutex<Vec<TaskHandle>>,
    observers: Arc<TaskObservers>,
}

impl ManualTaskRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every start so far.
    #[must_use]
    pub fn started(&self) -> Vec<StartedTask> {
        self.started.lock().clone()
    }

    /// Returns the kinds of every start so far.
    #[must_use]
    pub fn started_kinds(&self) -> Vec<TaskKind> {
        self.started.lock().iter().map(|t| t.kind).collect()
    }

    /// Returns how many tasks of `kind` were started.
    #[must_use]
    pub fn start_count(&self, kind: TaskKind) -> usize {
        self.started.lock().iter().filter(|t| t.kind == kind).count()
    }

    /// Returns the handle of the latest task of `kind`.
    #[must_use]
    pub fn last_handle(&self, kind: TaskKind) -> Option<TaskHandle> {
        self.started
            .lock()
            .iter()
            .rev()
            .find(|t| t.kind == kind)
            .map(|t| t.handle)
    }

    /// Returns the handles passed to [`TaskRunner::abort`].
    #[must_use]
    pub fn aborted(&self) -> Vec<TaskHandle> {
        self.aborted.lock().clone()
    }

    /// Reports the task as finished.
    pub fn finish(&self, handle: TaskHandle) {
        self.release_task(handle);
        self.observers.notify(|o| o.on_finished(handle));
    }

    /// Reports the task as disappeared.
    pub fn disappear(&self, handle: TaskHandle) {
        self.release_task(handle);
        self.observers.notify(|o| o.on_disappeared(handle));
    }

    /// Posts a message on behalf of the task.
    pub fn post(&self, handle: TaskHandle, message: JobMessage) {
        self.observers
            .notify(|o| o.on_message(handle, message.clone()));
    }

    /// Marks `group` as owned by a task the sequencer does not know about.
    pub fn occupy(&self, group: &str) -> TaskHandle {
        let handle = TaskHandle::new();
        self.groups.lock().insert(group.to_string(), handle);
        handle
    }

    /// Clears `group`.
    pub fn release(&self, group: &str) {
        self.groups.lock().remove(group);
    }

    /// Executes the stored work of a task to completion without reporting
    /// its end. Messages it posts reach observers as usual.
    pub async fn run(&self, handle: TaskHandle) -> Option<Result<(), InstallError>> {
        let task = self.pending.lock().remove(&handle)?;
        let ctx = TaskContext::new(
            handle,
            task.kind,
            task.token,
            Arc::new(AtomicBool::new(false)),
            self.observers.clone(),
        );
        Some((task.work)(ctx).await)
    }

    fn release_task(&self, handle: TaskHandle) {
        self.pending.lock().remove(&handle);
        self.groups.lock().retain(|_, owner| *owner != handle);
    }
}

impl TaskRunner for ManualTaskRunner {
    fn start(&self, kind: TaskKind, group: &str, work: TaskWork) -> TaskHandle {
        let handle = TaskHandle::new();
        self.started.lock().push(StartedTask {
            kind,
            group: group.to_string(),
            handle,
        });
        self.pending.lock().insert(
            handle,
            PendingTask {
                kind,
                work,
                token: Arc::new(CancellationToken::new()),
            },
        );
        self.groups.lock().insert(group.to_string(), handle);
        handle
    }

    fn handle_for(&self, group: &str) -> Option<TaskHandle> {
        self.groups.lock().get(group).copied()
    }

    fn abort(&self, handle: TaskHandle) {
        if let Some(task) = self.pending.lock().get(&handle) {
            task.token.cancel("Abort requested");
        }
        self.aborted.lock().push(handle);
    }

    fn subscribe(&self, observer: Weak<dyn TaskObserver>) {
        self.observers.subscribe(observer);
    }
}

impl std::fmt::Debug for ManualTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTaskRunner")
            .field("started", &self.started.lock().len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::task_work;

    #[test]
    fn test_finish_releases_group_slot() {
        let runner = ManualTaskRunner::new();
        let handle = runner.start(TaskKind::Install, "Install", task_work(|_| async { Ok(()) }));
        assert_eq!(runner.handle_for("Install"), Some(handle));

        runner.finish(handle);
        assert_eq!(runner.handle_for("Install"), None);
        assert_eq!(runner.start_count(TaskKind::Install), 1);
    }

    #[test]
    fn test_occupy_and_release() {
        let runner = ManualTaskRunner::new();
        let foreign = runner.occupy("Install");
        assert_eq!(runner.handle_for("Install"), Some(foreign));
        runner.release("Install");
        assert_eq!(runner.handle_for("Install"), None);
    }

    #[tokio::test]
    async fn test_run_executes_stored_work() {
        let runner = ManualTaskRunner::new();
        let handle = runner.start(
            TaskKind::WatchStatus,
            "Install",
            task_work(|_| async { Err(InstallError::StatusFileNotSet) }),
        );

        let result = runner.run(handle).await;
        assert!(matches!(result, Some(Err(InstallError::StatusFileNotSet))));
        assert!(runner.run(handle).await.is_none());
    }
}
