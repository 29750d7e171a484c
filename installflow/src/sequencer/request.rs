//! What to install.

use std::path::PathBuf;

use crate::installer::PackageMetadata;
use crate::package::PackagePreview;

/// The package an installation attempt installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Path of the package file.
    pub package: PathBuf,
    /// Package metadata; its post action drives the last step.
    pub metadata: PackageMetadata,
}

impl InstallRequest {
    /// Creates a request with empty metadata.
    #[must_use]
    pub fn new(package: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
            metadata: PackageMetadata::default(),
        }
    }

    /// Sets the post-install action.
    #[must_use]
    pub fn with_post_action(mut self, action: impl Into<String>) -> Self {
        self.metadata.post_action = action.into();
        self
    }

    /// Sets the package metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the post-install action, if any.
    #[must_use]
    pub fn post_action(&self) -> Option<&str> {
        let action = self.metadata.post_action.trim();
        (!action.is_empty()).then_some(action)
    }
}

impl From<PackagePreview> for InstallRequest {
    fn from(preview: PackagePreview) -> Self {
        Self {
            package: preview.path,
            metadata: preview.metadata,
        }
    }
}

/// Resolves a post-install action to the target handed to the installer.
///
/// Site-relative actions (starting with `/` and carrying no scheme) are
/// prefixed with the server URL; anything else is used as is.
#[must_use]
pub fn resolve_post_action_target(action: &str, server_url: &str) -> String {
    if !action.contains("://") && action.starts_with('/') {
        format!("{}{action}", server_url.trim_end_matches('/'))
    } else {
        action.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_action_gets_server_url() {
        assert_eq!(
            resolve_post_action_target("/module/x", "https://cms.local/"),
            "https://cms.local/module/x"
        );
    }

    #[test]
    fn test_absolute_url_untouched() {
        assert_eq!(
            resolve_post_action_target("https://other.host/setup", "https://cms.local"),
            "https://other.host/setup"
        );
    }

    #[test]
    fn test_type_name_untouched() {
        assert_eq!(
            resolve_post_action_target("Blog.Setup.PostStep, Blog", "https://cms.local"),
            "Blog.Setup.PostStep, Blog"
        );
    }

    #[test]
    fn test_blank_post_action_is_none() {
        assert_eq!(InstallRequest::new("p.zip").with_post_action("  ").post_action(), None);
        assert_eq!(
            InstallRequest::new("p.zip").with_post_action("/module/x").post_action(),
            Some("/module/x")
        );
    }
}
