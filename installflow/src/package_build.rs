//! Building a package from a project definition.
//!
//! [`PackageBuild`] runs a [`PackageGenerator`] as a single background task
//! in the [`BUILD_TASK_GROUP`] group and reports one [`BuildOutcome`]. The
//! task ends through the same runner callbacks the installation uses: a
//! finished task and a vanished one both complete the build, and a failure
//! the task posted before ending decides the outcome.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::errors::{FaultDescription, InstallError, PackageError};
use crate::installer::PackageMetadata;
use crate::package::DEFAULT_PACKAGE_EXTENSION;
use crate::runner::{
    catch_faults, task_work, JobMessage, TaskHandle, TaskKind, TaskObserver, TaskRunner,
};

/// Task group package builds run in.
pub const BUILD_TASK_GROUP: &str = "PackageDesigner";

/// File stem used when a project has neither name nor version.
pub const UNNAMED_PACKAGE: &str = "unnamed";

const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const INVALID_PATH_CHARS: &[char] = &['<', '>', '"', '|'];

/// Writes a package file from a project definition.
#[async_trait]
pub trait PackageGenerator: Send + Sync {
    /// Generates the package described by `project` into `output`.
    async fn generate(&self, project: &Path, output: &Path) -> anyhow::Result<()>;
}

/// Removes characters that cannot appear in a file name.
pub fn clean_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && !INVALID_FILE_NAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Suggests a file name for a package: `<name>-<version>.zip`.
///
/// The version part is left out when empty, and a project with neither part
/// is called [`UNNAMED_PACKAGE`].
pub fn package_file_name(metadata: &PackageMetadata) -> String {
    let mut name = clean_file_name(&metadata.name);
    let version = metadata.version.trim();
    if !version.is_empty() {
        name.push('-');
        name.push_str(version);
    }
    if name.is_empty() {
        name.push_str(UNNAMED_PACKAGE);
    }
    name.push('.');
    name.push_str(DEFAULT_PACKAGE_EXTENSION);
    name
}

/// Appends `.zip` unless `name` already ends with it, in any case.
pub fn ensure_package_extension(name: &str) -> String {
    let has_extension = Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DEFAULT_PACKAGE_EXTENSION));
    if has_extension {
        name.to_string()
    } else {
        format!("{name}.{DEFAULT_PACKAGE_EXTENSION}")
    }
}

/// Validates a user-entered package name and resolves where the package is
/// written. Relative names land in `package_dir`.
pub fn resolve_build_target(input: &str, package_dir: &Path) -> Result<PathBuf, PackageError> {
    let input = input.trim();
    let invalid = input
        .chars()
        .any(|c| c.is_control() || INVALID_PATH_CHARS.contains(&c));
    if input.is_empty() || invalid {
        return Err(PackageError::InvalidName);
    }

    let path = PathBuf::from(ensure_package_extension(input));
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(package_dir.join(path))
    }
}

/// How a package build ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The package was written.
    Built {
        /// Path of the generated package.
        package: PathBuf,
    },
    /// The generator failed.
    Failed {
        /// Message shown to the user.
        message: String,
    },
    /// The build was aborted.
    Aborted,
}

#[derive(Debug, Default)]
struct BuildState {
    handle: Option<TaskHandle>,
    failure: Option<FaultDescription>,
    aborted: bool,
    outcome: Option<BuildOutcome>,
}

/// A package build in flight.
pub struct PackageBuild {
    runner: Arc<dyn TaskRunner>,
    output: PathBuf,
    state: Mutex<BuildState>,
    completed: Notify,
}

impl PackageBuild {
    /// Starts generating `project` into `output`.
    ///
    /// `output` is given the `.zip` extension if it lacks it.
    pub fn start(
        runner: Arc<dyn TaskRunner>,
        generator: Arc<dyn PackageGenerator>,
        project: impl Into<PathBuf>,
        output: impl AsRef<Path>,
    ) -> Arc<Self> {
        let project = project.into();
        let output = PathBuf::from(ensure_package_extension(&output.as_ref().to_string_lossy()));

        let build = Arc::new(Self {
            runner,
            output: output.clone(),
            state: Mutex::new(BuildState::default()),
            completed: Notify::new(),
        });
        let as_observer = Arc::downgrade(&build) as Weak<dyn TaskObserver>;
        build.runner.subscribe(as_observer);

        info!(
            project = %project.display(),
            package = %output.display(),
            "Package generation started"
        );

        let work = task_work(move |ctx| async move {
            catch_faults(&ctx, async {
                generator
                    .generate(&project, &output)
                    .await
                    .map_err(InstallError::from_collaborator)
            })
            .await
        });

        let mut state = build.state.lock();
        state.handle = Some(build.runner.start(TaskKind::BuildPackage, BUILD_TASK_GROUP, work));
        drop(state);
        build
    }

    /// Returns the path the package is written to.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Returns the handle of the build task.
    pub fn handle(&self) -> Option<TaskHandle> {
        self.state.lock().handle
    }

    /// Returns the outcome, once the build has ended.
    pub fn outcome(&self) -> Option<BuildOutcome> {
        self.state.lock().outcome.clone()
    }

    /// Requests cancellation of the build task.
    pub fn abort(&self) {
        let handle = {
            let state = self.state.lock();
            if state.outcome.is_some() {
                return;
            }
            state.handle
        };
        if let Some(handle) = handle {
            self.runner.abort(handle);
        }
    }

    /// Waits until the build has ended.
    pub async fn wait(&self) -> BuildOutcome {
        loop {
            let notified = self.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.state.lock().outcome.clone() {
                return outcome;
            }
            notified.await;
        }
    }

    fn complete(&self, handle: TaskHandle) {
        {
            let mut state = self.state.lock();
            if state.handle != Some(handle) || state.outcome.is_some() {
                return;
            }

            let outcome = if let Some(fault) = &state.failure {
                warn!(error = %fault.full, "Package generation failed");
                BuildOutcome::Failed {
                    message: format!("Package generation failed: {}.", fault.short),
                }
            } else if state.aborted {
                info!("Package generation aborted");
                BuildOutcome::Aborted
            } else {
                info!(package = %self.output.display(), "Package generated");
                BuildOutcome::Built {
                    package: self.output.clone(),
                }
            };
            state.outcome = Some(outcome);
        }
        self.completed.notify_waiters();
    }
}

impl TaskObserver for PackageBuild {
    fn on_finished(&self, handle: TaskHandle) {
        self.complete(handle);
    }

    fn on_disappeared(&self, handle: TaskHandle) {
        self.complete(handle);
    }

    fn on_message(&self, handle: TaskHandle, message: JobMessage) {
        let mut state = self.state.lock();
        if state.handle != Some(handle) {
            return;
        }
        match message {
            JobMessage::Failed(fault) => {
                state.failure.get_or_insert(fault);
            }
            JobMessage::Aborted => state.aborted = true,
            JobMessage::SetTaskId(_) | JobMessage::CommittingFiles => {}
        }
    }
}

impl std::fmt::Debug for PackageBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageBuild")
            .field("output", &self.output)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallerConfig;
    use crate::runner::TokioTaskRunner;
    use crate::testing::{ManualTaskRunner, Script};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct ScriptedGenerator {
        script: Script,
        outputs: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedGenerator {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                outputs: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PackageGenerator for ScriptedGenerator {
        async fn generate(&self, _project: &Path, output: &Path) -> anyhow::Result<()> {
            self.outputs.lock().push(output.to_path_buf());
            self.script.perform("generate").await
        }
    }

    fn metadata(name: &str, version: &str) -> PackageMetadata {
        PackageMetadata {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_file_name_from_name_and_version() {
        assert_eq!(package_file_name(&metadata("Blog Module", "1.2")), "Blog Module-1.2.zip");
        assert_eq!(package_file_name(&metadata("Blog", "")), "Blog.zip");
    }

    #[test]
    fn test_file_name_drops_invalid_characters() {
        assert_eq!(package_file_name(&metadata("News: <Archive>?", "2")), "News Archive-2.zip");
    }

    #[test]
    fn test_file_name_for_unnamed_project() {
        assert_eq!(package_file_name(&metadata("", "")), "unnamed.zip");
        assert_eq!(package_file_name(&metadata("*?", " ")), "unnamed.zip");
    }

    #[test]
    fn test_extension_is_forced() {
        assert_eq!(ensure_package_extension("blog"), "blog.zip");
        assert_eq!(ensure_package_extension("blog.ZIP"), "blog.ZIP");
        assert_eq!(ensure_package_extension("blog.1.2"), "blog.1.2.zip");
    }

    #[test]
    fn test_build_target_validation() {
        let dir = Path::new("/packages");
        assert!(matches!(
            resolve_build_target("  ", dir),
            Err(PackageError::InvalidName)
        ));
        assert!(matches!(
            resolve_build_target("blog|news", dir),
            Err(PackageError::InvalidName)
        ));
        assert_eq!(
            resolve_build_target("blog-1.0", dir).unwrap(),
            PathBuf::from("/packages/blog-1.0.zip")
        );
        assert_eq!(
            PackageError::InvalidName.to_string(),
            "Enter a valid name for the package."
        );
    }

    #[test]
    fn test_build_runs_in_designer_group() {
        let runner = Arc::new(ManualTaskRunner::new());
        let build = PackageBuild::start(
            runner.clone(),
            ScriptedGenerator::new(Script::Succeed),
            "/projects/blog.xml",
            "/packages/blog",
        );

        let started = runner.started();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].kind, TaskKind::BuildPackage);
        assert_eq!(started[0].group, BUILD_TASK_GROUP);
        assert_eq!(build.output(), Path::new("/packages/blog.zip"));
        assert_eq!(build.outcome(), None);
    }

    #[test]
    fn test_finished_and_disappeared_both_complete() {
        for vanish in [false, true] {
            let runner = Arc::new(ManualTaskRunner::new());
            let build = PackageBuild::start(
                runner.clone(),
                ScriptedGenerator::new(Script::Succeed),
                "/projects/blog.xml",
                "/packages/blog.zip",
            );
            let handle = runner.last_handle(TaskKind::BuildPackage).unwrap();
            if vanish {
                runner.disappear(handle);
            } else {
                runner.finish(handle);
            }

            assert_eq!(
                build.outcome(),
                Some(BuildOutcome::Built {
                    package: PathBuf::from("/packages/blog.zip")
                })
            );
        }
    }

    #[test]
    fn test_posted_failure_decides_outcome() {
        let runner = Arc::new(ManualTaskRunner::new());
        let build = PackageBuild::start(
            runner.clone(),
            ScriptedGenerator::new(Script::Succeed),
            "/projects/blog.xml",
            "/packages/blog.zip",
        );
        let handle = runner.last_handle(TaskKind::BuildPackage).unwrap();
        runner.post(
            handle,
            JobMessage::Failed(FaultDescription::new("Item not found", "Item not found (method: X)")),
        );
        runner.disappear(handle);
        runner.finish(handle);

        assert_eq!(
            build.outcome(),
            Some(BuildOutcome::Failed {
                message: "Package generation failed: Item not found.".into()
            })
        );
    }

    #[test]
    fn test_foreign_task_callbacks_are_ignored() {
        let runner = Arc::new(ManualTaskRunner::new());
        let build = PackageBuild::start(
            runner.clone(),
            ScriptedGenerator::new(Script::Succeed),
            "/projects/blog.xml",
            "/packages/blog.zip",
        );
        let foreign = runner.occupy("Install");
        runner.finish(foreign);

        assert_eq!(build.outcome(), None);
    }

    #[tokio::test]
    async fn test_generator_fault_reports_failure() {
        let runner = Arc::new(TokioTaskRunner::from_config(&InstallerConfig::new()));
        let generator = ScriptedGenerator::new(Script::Fail(
            "Source item missing (method: Project.Load)".into(),
        ));
        let build = PackageBuild::start(runner, generator.clone(), "/projects/blog.xml", "/out/blog");

        let outcome = tokio::time::timeout(Duration::from_secs(5), build.wait())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BuildOutcome::Failed {
                message: "Package generation failed: Source item missing.".into()
            }
        );
        assert_eq!(*generator.outputs.lock(), vec![PathBuf::from("/out/blog.zip")]);
    }

    #[tokio::test]
    async fn test_generator_success_reports_package() {
        let runner = Arc::new(TokioTaskRunner::from_config(&InstallerConfig::new()));
        let build = PackageBuild::start(
            runner,
            ScriptedGenerator::new(Script::Succeed),
            "/projects/blog.xml",
            "/out/blog.zip",
        );

        let outcome = tokio::time::timeout(Duration::from_secs(5), build.wait())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BuildOutcome::Built {
                package: PathBuf::from("/out/blog.zip")
            }
        );
    }

    #[tokio::test]
    async fn test_abort_stops_hanging_generator() {
        let runner = Arc::new(TokioTaskRunner::from_config(&InstallerConfig::new()));
        let build = PackageBuild::start(
            runner.clone(),
            ScriptedGenerator::new(Script::Hang),
            "/projects/blog.xml",
            "/out/blog.zip",
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        build.abort();

        let outcome = tokio::time::timeout(Duration::from_secs(5), build.wait())
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Aborted);
    }
}
