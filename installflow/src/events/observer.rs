//! Install observer trait and implementations.

use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn, Level};

use crate::core::{InstallationResult, InstallationStep, ResultKind};

/// Capability implemented by the surrounding UI to follow an installation.
///
/// Callbacks are invoked outside the sequencer's state lock, from whichever
/// context drove the transition.
pub trait InstallObserver: Send + Sync {
    /// Called each time the current step changes.
    fn on_step_advanced(&self, step: InstallationStep);

    /// Called exactly once with the terminal result.
    fn on_completed(&self, result: &InstallationResult);
}

/// An observer that discards all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpInstallObserver;

impl InstallObserver for NoOpInstallObserver {
    fn on_step_advanced(&self, _step: InstallationStep) {}

    fn on_completed(&self, _result: &InstallationResult) {}
}

/// An observer that logs notifications using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingInstallObserver {
    level: Level,
}

impl Default for LoggingInstallObserver {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingInstallObserver {
    /// Creates a new logging observer with the specified level for step changes.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging observer.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Returns the level step changes are logged at.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }
}

impl InstallObserver for LoggingInstallObserver {
    fn on_step_advanced(&self, step: InstallationStep) {
        match self.level {
            Level::TRACE => trace!(step = %step, "Installation step advanced"),
            Level::DEBUG => debug!(step = %step, "Installation step advanced"),
            Level::INFO => info!(step = %step, "Installation step advanced"),
            Level::WARN => warn!(step = %step, "Installation step advanced"),
            _ => error!(step = %step, "Installation step advanced"),
        }
    }

    fn on_completed(&self, result: &InstallationResult) {
        match result.outcome {
            ResultKind::Success => info!("Installation completed"),
            ResultKind::Aborted => info!("Installation was aborted"),
            ResultKind::Failure => warn!(
                reason = %result.short_reason,
                detail = %result.full_reason,
                "Installation failed"
            ),
        }
    }
}

/// A collecting observer for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingInstallObserver {
    steps: RwLock<Vec<InstallationStep>>,
    results: RwLock<Vec<InstallationResult>>,
}

impl CollectingInstallObserver {
    /// Creates a new collecting observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the steps in the order they were entered.
    #[must_use]
    pub fn steps(&self) -> Vec<InstallationStep> {
        self.steps.read().clone()
    }

    /// Returns every reported result.
    #[must_use]
    pub fn results(&self) -> Vec<InstallationResult> {
        self.results.read().clone()
    }

    /// Returns the first reported result.
    #[must_use]
    pub fn result(&self) -> Option<InstallationResult> {
        self.results.read().first().cloned()
    }

    /// Returns the number of reported results.
    #[must_use]
    pub fn completion_count(&self) -> usize {
        self.results.read().len()
    }
}

impl InstallObserver for CollectingInstallObserver {
    fn on_step_advanced(&self, step: InstallationStep) {
        self.steps.write().push(step);
    }

    fn on_completed(&self, result: &InstallationResult) {
        self.results.write().push(result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_noop_observer() {
        let observer = NoOpInstallObserver;
        observer.on_step_advanced(InstallationStep::Done);
        observer.on_completed(&InstallationResult::success());
    }

    #[test]
    fn test_logging_observer() {
        let observer = LoggingInstallObserver::debug();
        observer.on_step_advanced(InstallationStep::WaitForFiles);
        observer.on_completed(&InstallationResult::failure("short", "full"));
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_step_line(level: Level) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .finish();

        let observer = LoggingInstallObserver::new(level);
        tracing::subscriber::with_default(subscriber, || {
            observer.on_step_advanced(InstallationStep::RunPostAction);
        });
        let bytes = capture.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_logging_observer_honors_every_level() {
        for (level, label) in [
            (Level::TRACE, "TRACE"),
            (Level::DEBUG, "DEBUG"),
            (Level::INFO, "INFO"),
            (Level::WARN, "WARN"),
            (Level::ERROR, "ERROR"),
        ] {
            let line = logged_step_line(level);
            assert!(line.contains(label), "expected {label} in {line:?}");
            assert!(line.contains("run_post_action"));
            assert_eq!(LoggingInstallObserver::new(level).level(), level);
        }
    }

    #[test]
    fn test_collecting_observer() {
        let observer = CollectingInstallObserver::new();
        assert!(observer.result().is_none());

        observer.on_step_advanced(InstallationStep::WaitForFiles);
        observer.on_step_advanced(InstallationStep::InstallSecurity);
        observer.on_completed(&InstallationResult::aborted());

        assert_eq!(
            observer.steps(),
            vec![InstallationStep::WaitForFiles, InstallationStep::InstallSecurity]
        );
        assert_eq!(observer.completion_count(), 1);
        assert_eq!(observer.result().unwrap().outcome, ResultKind::Aborted);
    }
}
