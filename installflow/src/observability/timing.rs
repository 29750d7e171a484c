//! Step timing.

use std::time::Instant;

use crate::core::InstallationStep;

/// Measures how long the installation stays in one step.
#[derive(Debug, Clone, Copy)]
pub struct StepTimer {
    step: InstallationStep,
    start: Instant,
}

impl StepTimer {
    /// Starts timing `step`.
    #[must_use]
    pub fn start(step: InstallationStep) -> Self {
        Self {
            step,
            start: Instant::now(),
        }
    }

    /// Returns the timed step.
    #[must_use]
    pub fn step(&self) -> InstallationStep {
        self.step
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
