//! Notifications exposed to the surrounding UI.
//!
//! The UI layer implements [`InstallObserver`] and injects it into the
//! sequencer at construction time.

mod observer;

pub use observer::{
    CollectingInstallObserver, InstallObserver, LoggingInstallObserver, NoOpInstallObserver,
};
