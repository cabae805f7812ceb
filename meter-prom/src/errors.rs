use thiserror::Error;

/// Error types for metrics collection
#[derive(Error, Debug)]
pub enum PromError {
    /// Error during HTTP communication
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Non-success status from the query endpoint
    #[error("query endpoint returned {status}: {body}")]
    QueryFailed {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The query succeeded but matched no series
    #[error("query returned no results: {0}")]
    EmptyResult(String),

    /// Error decoding a query response
    #[error("Failed to decode response: {0}")]
    DecodeError(#[from] serde_json::Error),

    /// Generic error type for other failures
    #[error("Operation failed: {0}")]
    Other(String),
}

impl PromError {
    /// Whether a retry could plausibly change the outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            PromError::HttpError(_) => true,
            PromError::QueryFailed { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            PromError::EmptyResult(_) | PromError::DecodeError(_) | PromError::Other(_) => false,
        }
    }
}
