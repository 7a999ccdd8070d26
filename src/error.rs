//! Error type shared by the remote boundary and the annotation store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The request never produced a response (connect, reset, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status. `readable` is false when
    /// the body was not JSON (a proxy or framework error page).
    #[error("server returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
        readable: bool,
    },

    /// The server answered 2xx but reported a logical failure.
    #[error("{0}")]
    Application(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The safety deadline closed the indicator before the job settled.
    #[error("{job} did not finish within {secs} seconds")]
    TimedOut { job: String, secs: u64 },

    /// The task driving a remote job panicked or was aborted.
    #[error("job failed: {0}")]
    Job(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    /// Network failure, non-2xx status, or an unreadable body.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Status { .. } | SyncError::Decode(_)
        )
    }

    /// No readable response came back: no answer, or a body that is not JSON.
    pub fn is_network_layer(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_)
                | SyncError::Decode(_)
                | SyncError::Status {
                    readable: false,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
