//! Lifecycle of long-running remote jobs behind one shared progress indicator.

mod controller;
mod state;

pub use controller::{JobController, JobOutcome, JobTicket, DEFAULT_JOB_TIMEOUT};
pub use state::{JobId, JobSnapshot, JobState};
