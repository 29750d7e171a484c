//! Configuration for the installation orchestrator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::InstallError;

/// Configuration shared by the sequencer, the task runner and the status poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Task group every installation task runs in.
    #[serde(default = "default_task_group")]
    pub task_group: String,
    /// Interval between status record reads, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay before a deferred post-action start is retried, in milliseconds.
    #[serde(default = "default_post_action_retry_ms")]
    pub post_action_retry_ms: u64,
    /// How long an aborted task may keep running before it is force-terminated.
    #[serde(default = "default_force_abort_grace_ms")]
    pub force_abort_grace_ms: u64,
    /// Server URL prefixed to site-relative post-action targets.
    #[serde(default)]
    pub server_url: String,
    /// Directory holding file-commit status records.
    #[serde(default = "default_status_dir")]
    pub status_dir: PathBuf,
    /// Directory relative package names are resolved against.
    #[serde(default = "default_package_dir")]
    pub package_dir: PathBuf,
}

fn default_task_group() -> String {
    "Install".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_post_action_retry_ms() -> u64 {
    100
}

fn default_force_abort_grace_ms() -> u64 {
    5_000
}

fn default_status_dir() -> PathBuf {
    std::env::temp_dir().join("installflow")
}

fn default_package_dir() -> PathBuf {
    PathBuf::from("packages")
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            task_group: default_task_group(),
            poll_interval_ms: default_poll_interval_ms(),
            post_action_retry_ms: default_post_action_retry_ms(),
            force_abort_grace_ms: default_force_abort_grace_ms(),
            server_url: String::new(),
            status_dir: default_status_dir(),
            package_dir: default_package_dir(),
        }
    }
}

impl InstallerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, InstallError> {
        serde_json::from_str(json).map_err(|e| InstallError::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InstallError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            InstallError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Sets the task group.
    #[must_use]
    pub fn with_task_group(mut self, group: impl Into<String>) -> Self {
        self.task_group = group.into();
        self
    }

    /// Sets the status poll interval.
    #[must_use]
    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    /// Sets the post-action retry delay.
    #[must_use]
    pub fn with_post_action_retry_ms(mut self, delay: u64) -> Self {
        self.post_action_retry_ms = delay;
        self
    }

    /// Sets the forced abort grace period.
    #[must_use]
    pub fn with_force_abort_grace_ms(mut self, grace: u64) -> Self {
        self.force_abort_grace_ms = grace;
        self
    }

    /// Sets the server URL.
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Sets the status record directory.
    #[must_use]
    pub fn with_status_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.status_dir = dir.into();
        self
    }

    /// Sets the package directory.
    #[must_use]
    pub fn with_package_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_dir = dir.into();
        self
    }

    /// Gets the poll interval as Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Gets the post-action retry delay as Duration.
    #[must_use]
    pub fn post_action_retry(&self) -> Duration {
        Duration::from_millis(self.post_action_retry_ms)
    }

    /// Gets the forced abort grace period as Duration.
    #[must_use]
    pub fn force_abort_grace(&self) -> Duration {
        Duration::from_millis(self.force_abort_grace_ms)
    }

    /// Returns the status record location for a main installation task.
    #[must_use]
    pub fn status_file_for(&self, task_id: &str) -> PathBuf {
        self.status_dir.join(format!("{task_id}.status.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InstallerConfig::default();
        assert_eq!(config.task_group, "Install");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.post_action_retry(), Duration::from_millis(100));
        assert!(config.server_url.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = InstallerConfig::from_json_str(
            r#"{"server_url": "https://cms.example.com", "poll_interval_ms": 25}"#,
        )
        .unwrap();
        assert_eq!(config.server_url, "https://cms.example.com");
        assert_eq!(config.poll_interval_ms, 25);
        assert_eq!(config.force_abort_grace_ms, 5_000);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = InstallerConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, InstallError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installer.json");
        std::fs::write(&path, r#"{"task_group": "Packages"}"#).unwrap();

        let config = InstallerConfig::from_file(&path).unwrap();
        assert_eq!(config.task_group, "Packages");
    }

    #[test]
    fn test_status_file_for() {
        let config = InstallerConfig::new().with_status_dir("/var/status");
        assert_eq!(
            config.status_file_for("abc"),
            PathBuf::from("/var/status/abc.status.json")
        );
    }
}
