//! Cooperative cancellation for background installation tasks.

mod token;

pub use token::CancellationToken;
