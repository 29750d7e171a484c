//! # Installflow
//!
//! Orchestration of multi-step package installation.
//!
//! An installation attempt runs through a fixed sequence of steps, each
//! delegated to a background task:
//!
//! - **Main installation**: items and files are installed by the installer
//! - **File commit wait**: a status record written by the commit subsystem is
//!   polled until it reports an outcome
//! - **Security installation**: accounts and roles are installed
//! - **Post action**: the package's optional post-install action runs
//!
//! Packages are built the same way: [`package_build::PackageBuild`] runs a
//! generator as one background task and reports its outcome.
//!
//! Exactly one terminal result (success, failure or abort) is reported per
//! attempt, whatever order task callbacks arrive in.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use installflow::prelude::*;
//!
//! let config = InstallerConfig::from_file("installflow.json")?;
//! let runner = Arc::new(TokioTaskRunner::from_config(&config));
//! let sequencer = StepSequencer::new(
//!     config,
//!     InstallRequest::from(preview),
//!     installer,
//!     runner,
//!     Arc::new(LoggingInstallObserver::default()),
//! );
//!
//! sequencer.start();
//! let result = sequencer.wait().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod installer;
pub mod observability;
pub mod package;
pub mod package_build;
pub mod runner;
pub mod sequencer;
pub mod status;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::InstallerConfig;
    pub use crate::core::{
        InstallationResult, InstallationStep, ResultKind, SequencerEvent, StepOutcome,
    };
    pub use crate::errors::{FaultDescription, FaultKind, InstallError, PackageError};
    pub use crate::events::{InstallObserver, LoggingInstallObserver, NoOpInstallObserver};
    pub use crate::installer::{Installer, PackageMetadata, ProcessingContext};
    pub use crate::package::{load_package, MetadataReader, PackagePreview};
    pub use crate::package_build::{
        package_file_name, BuildOutcome, PackageBuild, PackageGenerator,
    };
    pub use crate::runner::{JobMessage, TaskContext, TaskRunner, TokioTaskRunner};
    pub use crate::sequencer::{InstallRequest, StepSequencer};
    pub use crate::status::{StatusPoller, StatusRecord, StatusState};
}
