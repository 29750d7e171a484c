//! Status records of the file-commit phase and the poller that watches them.

mod poller;
mod record;

pub use poller::StatusPoller;
pub use record::{read_status_file, write_status_file, StatusRecord, StatusState};
