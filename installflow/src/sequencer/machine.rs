//! The step sequencer.
//!
//! [`StepSequencer`] drives one installation attempt through its steps. It
//! owns the step, the handle of the task it is waiting for and the pending
//! post action, all behind a single lock. Task callbacks arrive from runner
//! threads; each one is checked against the recorded handle, fed through
//! [`transition`] and the resulting action is carried out before the lock is
//! released. Observer notifications are queued under the lock and delivered
//! in order by one thread at a time, never while the lock is held.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::request::{resolve_post_action_target, InstallRequest};
use super::work;
use crate::config::InstallerConfig;
use crate::core::{transition, InstallationResult, InstallationStep, SequencerEvent, StepAction};
use crate::errors::FaultKind;
use crate::events::InstallObserver;
use crate::installer::Installer;
use crate::observability::StepTimer;
use crate::runner::{JobMessage, TaskHandle, TaskKind, TaskObserver, TaskRunner, TaskWork};
use crate::status::StatusPoller;

#[derive(Debug, Default)]
struct SequencerState {
    step: InstallationStep,
    current: Option<TaskHandle>,
    started: bool,
    main_task_id: Option<String>,
    post_action: Option<String>,
    retry_scheduled: bool,
    result: Option<InstallationResult>,
    timer: Option<StepTimer>,
    notices: VecDeque<Notice>,
    delivering: bool,
    reported: Option<InstallationResult>,
}

#[derive(Debug)]
enum Notice {
    Step(InstallationStep),
    Completed(InstallationResult),
}

/// Drives one installation attempt.
pub struct StepSequencer {
    me: Weak<StepSequencer>,
    config: InstallerConfig,
    request: InstallRequest,
    installer: Arc<dyn Installer>,
    runner: Arc<dyn TaskRunner>,
    observer: Arc<dyn InstallObserver>,
    poller: StatusPoller,
    runtime: Option<Handle>,
    state: Mutex<SequencerState>,
    completed: Notify,
}

impl StepSequencer {
    /// Creates a sequencer and subscribes it to the runner's callbacks.
    ///
    /// When called inside a tokio runtime, that runtime drives the post-action
    /// retry timer even if later calls come from threads outside it.
    pub fn new(
        config: InstallerConfig,
        request: InstallRequest,
        installer: Arc<dyn Installer>,
        runner: Arc<dyn TaskRunner>,
        observer: Arc<dyn InstallObserver>,
    ) -> Arc<Self> {
        let post_action = request.post_action().map(str::to_string);
        let poller = StatusPoller::from_config(&config);

        let sequencer = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            request,
            installer,
            runner,
            observer,
            poller,
            runtime: Handle::try_current().ok(),
            state: Mutex::new(SequencerState {
                post_action,
                ..SequencerState::default()
            }),
            completed: Notify::new(),
        });

        let as_observer = Arc::downgrade(&sequencer) as Weak<dyn TaskObserver>;
        sequencer.runner.subscribe(as_observer);
        sequencer
    }

    /// Starts the main installation task. Later calls are ignored.
    pub fn start(&self) {
        {
            let mut state = self.state.lock();
            if state.started {
                warn!("Installation already started; ignoring start request");
                return;
            }
            state.started = true;
            state.timer = Some(StepTimer::start(state.step));
            if state.step != InstallationStep::MainInstallation {
                debug!(step = %state.step, "Installation ended before it started");
                return;
            }

            info!(package = %self.request.package.display(), "Starting installation");
            let work = work::main_install(self.installer.clone(), self.request.package.clone());
            self.dispatch(&mut state, TaskKind::Install, work);
            state.notices.push_back(Notice::Step(InstallationStep::MainInstallation));
        }
        self.deliver();
    }

    /// Aborts the installation. Reports an aborted result unless the attempt
    /// already ended; any task in flight is asked to stop.
    pub fn abort(&self) {
        info!("Abort requested");
        self.handle_event(SequencerEvent::Abort);
    }

    /// Asks for the post action to be started. When a task is still in
    /// flight, or the installation has not reached the post-action step, the
    /// request is retried after the configured delay.
    pub fn request_post_action(&self) {
        let mut state = self.state.lock();
        if state.step.is_terminal() || state.post_action.is_none() {
            debug!(step = %state.step, "No post action pending");
            return;
        }
        self.start_post_action(&mut state);
    }

    /// Returns the current step.
    #[must_use]
    pub fn step(&self) -> InstallationStep {
        self.state.lock().step
    }

    /// Returns the handle of the task the sequencer is waiting for.
    #[must_use]
    pub fn current_task(&self) -> Option<TaskHandle> {
        self.state.lock().current
    }

    /// Returns the processing task id reported by the main installation.
    #[must_use]
    pub fn main_task_id(&self) -> Option<String> {
        self.state.lock().main_task_id.clone()
    }

    /// Returns true while a post action is still waiting to run.
    #[must_use]
    pub fn has_pending_post_action(&self) -> bool {
        self.state.lock().post_action.is_some()
    }

    /// Returns the terminal result, once produced.
    #[must_use]
    pub fn result(&self) -> Option<InstallationResult> {
        self.state.lock().result.clone()
    }

    /// Waits until the terminal result has been delivered to the observer.
    pub async fn wait(&self) -> InstallationResult {
        loop {
            let notified = self.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.state.lock().reported.clone() {
                return result;
            }
            notified.await;
        }
    }

    fn handle_event(&self, event: SequencerEvent) {
        self.apply(&mut self.state.lock(), event);
        self.deliver();
    }

    fn handle_task_event(&self, handle: TaskHandle, event: SequencerEvent) {
        {
            let mut state = self.state.lock();
            if state.current != Some(handle) {
                debug!(%handle, ?event, "Ignoring callback from a stale task");
                return;
            }
            if matches!(event, SequencerEvent::TaskFinished | SequencerEvent::TaskDisappeared) {
                state.current = None;
            }
            self.apply(&mut state, event);
        }
        self.deliver();
    }

    fn apply(&self, state: &mut SequencerState, event: SequencerEvent) {
        let from = state.step;
        let outcome = transition(from, &event, state.post_action.is_some());
        if outcome.is_noop(from) {
            debug!(step = %from, ?event, "Event has no effect");
            return;
        }

        if outcome.next != from {
            let elapsed_ms = state.timer.map_or(0.0, |t| t.elapsed_ms());
            info!(from = %from, to = %outcome.next, elapsed_ms, "Installation step advanced");
            state.step = outcome.next;
            state.timer = Some(StepTimer::start(outcome.next));
            state.notices.push_back(Notice::Step(outcome.next));
        }

        match outcome.action {
            StepAction::None => {}
            StepAction::StartWatch => {
                let location = state
                    .main_task_id
                    .as_deref()
                    .map(|id| self.config.status_file_for(id));
                let work = work::watch_status(self.poller.clone(), location);
                self.dispatch(state, TaskKind::WatchStatus, work);
            }
            StepAction::StartSecurity => {
                let work =
                    work::install_security(self.installer.clone(), self.request.package.clone());
                self.dispatch(state, TaskKind::InstallSecurity, work);
            }
            StepAction::StartPostAction => self.start_post_action(state),
            StepAction::Complete(result) => {
                if let Some(handle) = state.current.take() {
                    if matches!(event, SequencerEvent::Abort) {
                        self.runner.abort(handle);
                    }
                }
                state.post_action = None;
                if state.result.is_none() {
                    info!(
                        outcome = %result.outcome,
                        reason = %result.short_reason,
                        "Installation completed"
                    );
                    state.result = Some(result.clone());
                    state.notices.push_back(Notice::Completed(result));
                }
            }
        }
    }

    fn start_post_action(&self, state: &mut SequencerState) {
        let occupied = state.current.is_some()
            || self.runner.handle_for(&self.config.task_group).is_some();
        if state.step != InstallationStep::RunPostAction || occupied {
            info!(
                kind = %FaultKind::ReentrantStartAttempt,
                step = %state.step,
                "Waiting for installation task completion"
            );
            self.schedule_post_action_retry(state);
            return;
        }

        let Some(action) = state.post_action.take() else {
            return;
        };
        let target = resolve_post_action_target(&action, &self.config.server_url);
        info!(%target, "Running post action");
        let work = work::post_action(
            self.installer.clone(),
            target,
            self.request.metadata.clone(),
        );
        self.dispatch(state, TaskKind::RunPostAction, work);
    }

    fn schedule_post_action_retry(&self, state: &mut SequencerState) {
        if state.retry_scheduled {
            return;
        }
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            warn!("No async runtime available; post action stays pending");
            return;
        };

        let me = self.me.clone();
        let delay = self.config.post_action_retry();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(sequencer) = me.upgrade() {
                sequencer.retry_post_action();
            }
        });
        state.retry_scheduled = true;
    }

    fn retry_post_action(&self) {
        let mut state = self.state.lock();
        state.retry_scheduled = false;
        if state.step.is_terminal() || state.post_action.is_none() {
            return;
        }
        self.start_post_action(&mut state);
    }

    fn dispatch(&self, state: &mut SequencerState, kind: TaskKind, work: TaskWork) {
        let handle = self.runner.start(kind, &self.config.task_group, work);
        if let Some(previous) = state.current.replace(handle) {
            debug!(%previous, %handle, "Task superseded");
        }
        info!(task = %kind, %handle, "Task dispatched");
    }

    /// Drains the notice queue unless another thread already is; that thread
    /// then delivers the notices queued here as well.
    fn deliver(&self) {
        {
            let mut state = self.state.lock();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }

        loop {
            let notice = {
                let mut state = self.state.lock();
                let Some(notice) = state.notices.pop_front() else {
                    state.delivering = false;
                    return;
                };
                notice
            };

            match notice {
                Notice::Step(step) => self.observer.on_step_advanced(step),
                Notice::Completed(result) => {
                    self.observer.on_completed(&result);
                    self.state.lock().reported = Some(result);
                    self.completed.notify_waiters();
                }
            }
        }
    }
}

impl TaskObserver for StepSequencer {
    fn on_finished(&self, handle: TaskHandle) {
        self.handle_task_event(handle, SequencerEvent::TaskFinished);
    }

    fn on_disappeared(&self, handle: TaskHandle) {
        self.handle_task_event(handle, SequencerEvent::TaskDisappeared);
    }

    fn on_message(&self, handle: TaskHandle, message: JobMessage) {
        match message {
            JobMessage::SetTaskId(task_id) => {
                let mut state = self.state.lock();
                if state.current != Some(handle) {
                    debug!(%handle, "Ignoring task id from a stale task");
                    return;
                }
                debug!(%task_id, "Processing task id recorded");
                state.main_task_id = Some(task_id);
            }
            JobMessage::CommittingFiles => {
                self.handle_task_event(handle, SequencerEvent::CommittingFiles);
            }
            JobMessage::Aborted => self.handle_task_event(handle, SequencerEvent::Abort),
            JobMessage::Failed(fault) => {
                self.handle_task_event(handle, SequencerEvent::Failure(fault));
            }
        }
    }
}

impl std::fmt::Debug for StepSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StepSequencer")
            .field("package", &self.request.package)
            .field("step", &state.step)
            .field("current", &state.current)
            .field("completed", &state.result.is_some())
            .finish()
    }
}
