//! Observability utilities.

mod logging;
mod timing;

pub use logging::{init_logging, LogFormat};
pub use timing::StepTimer;
