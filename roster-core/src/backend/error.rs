use crate::directory::RecordId;

/// All errors a [`RecordBackend`](super::RecordBackend) can return.
///
/// Each variant corresponds to an HTTP-style status code, see
/// [`BackendError::status`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No record with the given id (404).
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// The request was refused as malformed (400).
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The backend failed to serve the request (500).
    #[error("server error: {0}")]
    Server(String),
}

impl BackendError {
    pub fn status(&self) -> u16 {
        match self {
            BackendError::NotFound(_) => 404,
            BackendError::Invalid(_) => 400,
            BackendError::Server(_) => 500,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Server(_))
    }
}
