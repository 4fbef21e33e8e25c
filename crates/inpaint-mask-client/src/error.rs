//! Errors surfaced by the segmentation client.

use inpaint_mask::MaskError;

/// Errors that can occur while requesting segmentation proposals.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be delivered or the response not read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("request rejected with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// The service reported that the segmentation job failed.
    #[error("segmentation job failed: {0}")]
    JobFailed(String),

    /// Polling gave up before the job finished.
    #[error("job still pending after {attempts} polls")]
    Timeout {
        /// Number of status polls performed.
        attempts: u32,
    },

    /// The request was superseded (new request or session reset).
    #[error("request superseded")]
    Cancelled,

    /// A returned mask could not be turned into a proposal.
    #[error(transparent)]
    Mask(#[from] MaskError),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}
