//! Error taxonomy for the launch pipeline.
//!
//! Three layers: `TransportError` for one HTTP transfer (recoverable only by
//! base-URL fallback during manifest fetch), `ManifestError` for manifest
//! verification (always fatal, user-facing message), and `LaunchError` as the
//! stage-level error the pipeline driver halts on.

use thiserror::Error;

use crate::manifest::ManifestError;

/// Error from a single HTTP transfer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Response carried a status other than 200.
    #[error("HTTP {0}")]
    Status(u32),
    /// Curl-level failure (connection, DNS, timeout, aborted write).
    #[error(transparent)]
    Curl(#[from] curl::Error),
    /// Local I/O failure while receiving the body.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal error raised by a pipeline stage. The message side of
/// `Verification` and `Fatal` is user-facing; `Internal` is shown generically
/// and the detail goes to the log only.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// A manifest failed to verify (tampered, malformed, unsupported).
    #[error("{0}")]
    Verification(String),
    /// Any other condition the launcher cannot recover from.
    #[error("{0}")]
    Fatal(String),
    /// Unexpected failure; a bug or an environment problem we did not
    /// classify. Displayed to the user as a generic message only.
    #[error("Unknown error: {0}")]
    Internal(anyhow::Error),
}

impl From<ManifestError> for LaunchError {
    fn from(e: ManifestError) -> Self {
        LaunchError::Verification(e.to_string())
    }
}

impl From<anyhow::Error> for LaunchError {
    fn from(e: anyhow::Error) -> Self {
        LaunchError::Internal(e)
    }
}
