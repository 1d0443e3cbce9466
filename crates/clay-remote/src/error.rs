use thiserror::Error;

/// Errors returned by the remote job-service clients.
///
/// Every variant is recoverable from the tracker's point of view: history
/// failures fall back to the local list, status failures leave the task
/// unchanged until the next poll cycle, and result-info failures fall back
/// to a synthesized download reference.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// An HTTP request failed (network error, timeout, non-2xx status).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was missing an expected field or had an unexpected
    /// shape.
    #[error("Invalid remote response: {message}")]
    InvalidResponse { message: String },
}
