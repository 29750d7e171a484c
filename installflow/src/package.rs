//! Package resolution and preview, run before an installation starts.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::InstallerConfig;
use crate::errors::PackageError;
use crate::installer::PackageMetadata;

/// Extension given to package names entered without one.
pub const DEFAULT_PACKAGE_EXTENSION: &str = "zip";

/// Reads package metadata without installing anything.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataReader: Send + Sync {
    /// Reads the metadata of the package at `path`.
    fn read(&self, path: &Path) -> anyhow::Result<PackageMetadata>;
}

/// A resolved package and its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePreview {
    /// Absolute or package-directory-relative path of the package file.
    pub path: PathBuf,
    /// The package metadata.
    pub metadata: PackageMetadata,
}

impl PackagePreview {
    /// Returns true if the package carries a license to accept.
    #[must_use]
    pub fn has_license(&self) -> bool {
        !self.metadata.license.is_empty()
    }

    /// Returns true if the package carries a readme.
    #[must_use]
    pub fn has_readme(&self) -> bool {
        !self.metadata.readme.is_empty()
    }

    /// Returns the post-install action, if any.
    #[must_use]
    pub fn post_action(&self) -> Option<&str> {
        let action = self.metadata.post_action.trim();
        (!action.is_empty()).then_some(action)
    }
}

/// Resolves a user-entered package name to a file path.
///
/// Names without an extension get `.zip`; relative names are resolved against
/// `package_dir`.
pub fn resolve_package_path(input: &str, package_dir: &Path) -> Result<PathBuf, PackageError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PackageError::NotSpecified);
    }

    let mut path = PathBuf::from(input);
    if path.extension().is_none() {
        path.set_extension(DEFAULT_PACKAGE_EXTENSION);
    }

    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(package_dir.join(path))
    }
}

/// Resolves, validates and previews a package.
pub fn load_package(
    reader: &dyn MetadataReader,
    input: &str,
    config: &InstallerConfig,
) -> Result<PackagePreview, PackageError> {
    let path = resolve_package_path(input, &config.package_dir)?;
    if !path.is_file() {
        return Err(PackageError::NotFound(path));
    }

    let mut metadata = reader.read(&path).map_err(|source| PackageError::Unreadable {
        path: path.clone(),
        source,
    })?;
    metadata.format_version = metadata.derived_format_version();

    info!(
        package = %path.display(),
        name = %metadata.name,
        version = %metadata.version,
        format_version = metadata.format_version,
        "Package loaded"
    );

    Ok(PackagePreview { path, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_for(dir: &Path) -> InstallerConfig {
        InstallerConfig::new().with_package_dir(dir)
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = resolve_package_path("   ", Path::new("/packages")).unwrap_err();
        assert!(matches!(err, PackageError::NotSpecified));
    }

    #[test]
    fn test_missing_extension_defaults_to_zip() {
        let path = resolve_package_path("blog-module", Path::new("/packages")).unwrap();
        assert_eq!(path, PathBuf::from("/packages/blog-module.zip"));
    }

    #[test]
    fn test_absolute_path_kept() {
        let path = resolve_package_path("/tmp/pkg.zip", Path::new("/packages")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/pkg.zip"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let reader = MockMetadataReader::new();

        let err = load_package(&reader, "absent", &config_for(dir.path())).unwrap_err();
        assert!(matches!(err, PackageError::NotFound(_)));
    }

    #[test]
    fn test_preview_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blog.zip"), b"PK").unwrap();

        let mut reader = MockMetadataReader::new();
        reader.expect_read().times(1).returning(|_| {
            Ok(PackageMetadata {
                name: "Blog".into(),
                version: "2.0".into(),
                license: "MIT".into(),
                post_action: " /module/blog/setup ".into(),
                ..Default::default()
            })
        });

        let preview = load_package(&reader, "blog", &config_for(dir.path())).unwrap();
        assert_eq!(preview.path, dir.path().join("blog.zip"));
        assert!(preview.has_license());
        assert!(!preview.has_readme());
        assert_eq!(preview.post_action(), Some("/module/blog/setup"));
        assert_eq!(preview.metadata.format_version, 1);
    }

    #[test]
    fn test_installer_version_selects_format_two() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blog.zip"), b"PK").unwrap();

        let mut reader = MockMetadataReader::new();
        reader.expect_read().returning(|_| {
            Ok(PackageMetadata {
                name: "Blog".into(),
                installer_version: Some("8.2".into()),
                format_version: 7,
                ..Default::default()
            })
        });

        let preview = load_package(&reader, "blog", &config_for(dir.path())).unwrap();
        assert_eq!(preview.metadata.format_version, 2);
    }

    #[test]
    fn test_blank_installer_version_is_format_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blog.zip"), b"PK").unwrap();

        let mut reader = MockMetadataReader::new();
        reader.expect_read().returning(|_| {
            Ok(PackageMetadata {
                installer_version: Some("  ".into()),
                format_version: 2,
                ..Default::default()
            })
        });

        let preview = load_package(&reader, "blog", &config_for(dir.path())).unwrap();
        assert_eq!(preview.metadata.format_version, 1);
    }

    #[test]
    fn test_unreadable_package() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.zip"), b"").unwrap();

        let mut reader = MockMetadataReader::new();
        reader
            .expect_read()
            .returning(|_| Err(anyhow::anyhow!("central directory missing")));

        let err = load_package(&reader, "broken.zip", &config_for(dir.path())).unwrap_err();
        assert!(err.to_string().contains("could not be loaded"));
    }
}
