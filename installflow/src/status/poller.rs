//! Polling of file-commit status records.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

use super::{read_status_file, StatusState};
use crate::cancellation::CancellationToken;
use crate::config::InstallerConfig;
use crate::errors::InstallError;

/// Waits for a status record to reach a terminal state.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    interval: Duration,
}

impl StatusPoller {
    /// Creates a poller reading at the given interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Creates a poller from configuration.
    #[must_use]
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(config.poll_interval())
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks the calling task until the record at `location` is terminal.
    ///
    /// There is no deadline; cancelling `token` is the only way to stop early.
    /// A `Failed` record is returned as [`InstallError::BackgroundProcess`].
    pub async fn watch(&self, location: &Path, token: &CancellationToken) -> Result<(), InstallError> {
        debug!(location = %location.display(), "Watching installation status");
        loop {
            if token.is_cancelled() {
                return Err(InstallError::cancelled(token.reason().unwrap_or_default()));
            }

            if let Some(record) = read_status_file(location).await? {
                match record.state {
                    StatusState::Finished => {
                        debug!(location = %location.display(), "File commit finished");
                        return Ok(());
                    }
                    StatusState::Failed => {
                        return Err(InstallError::BackgroundProcess(
                            record.error.unwrap_or_else(|| "no error detail recorded".to_string()),
                        ));
                    }
                    StatusState::Pending => trace!("File commit pending"),
                }
            }

            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::from_config(&InstallerConfig::default())
    }
}
