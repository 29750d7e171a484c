//! File-backed status records written by the file-commit subsystem.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use crate::errors::InstallError;

/// State of the file-commit phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    /// Files are still being committed.
    Pending,
    /// All files were committed.
    Finished,
    /// The commit failed.
    Failed,
}

impl StatusState {
    /// Returns true for `Finished` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// A status record as persisted by the file-commit subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Current state.
    pub state: StatusState,
    /// Error detail, set when the state is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            state: StatusState::Pending,
            error: None,
        }
    }

    /// Creates a finished record.
    #[must_use]
    pub fn finished() -> Self {
        Self {
            state: StatusState::Finished,
            error: None,
        }
    }

    /// Creates a failed record.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: StatusState::Failed,
            error: Some(error.into()),
        }
    }
}

/// Reads the status record at `path`.
///
/// Returns `Ok(None)` while the record is not available yet: the file does not
/// exist, is empty, or holds a partially written document.
pub async fn read_status_file(path: &Path) -> Result<Option<StatusRecord>, InstallError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if bytes.is_empty() {
        return Ok(None);
    }

    match serde_json::from_slice(&bytes) {
        Ok(record) => Ok(Some(record)),
        Err(e) if e.is_eof() => {
            debug!(path = %path.display(), "Status record is partially written");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes a status record to `path`, replacing any previous record.
///
/// The record is written to a sibling temporary file first and renamed into
/// place, so readers never observe a partial document.
pub async fn write_status_file(path: &Path, record: &StatusRecord) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let staging = path.with_extension("tmp");
    tokio::fs::write(&staging, serde_json::to_vec(record)?).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_file_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let record = read_status_file(&dir.path().join("absent.json")).await.unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_partial_document_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        tokio::fs::write(&path, br#"{"state": "fin"#).await.unwrap();

        assert!(read_status_file(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.json");
        tokio::fs::write(&path, b"not json at all").await.unwrap();

        let err = read_status_file(&path).await.unwrap_err();
        assert!(matches!(err, InstallError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("task.status.json");

        write_status_file(&path, &StatusRecord::failed("disk full")).await.unwrap();

        let record = read_status_file(&path).await.unwrap().unwrap();
        assert_eq!(record.state, StatusState::Failed);
        assert_eq!(record.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&StatusRecord::finished()).unwrap();
        assert_eq!(json, r#"{"state":"finished"}"#);
        assert!(StatusState::Finished.is_terminal());
        assert!(!StatusState::Pending.is_terminal());
    }
}
