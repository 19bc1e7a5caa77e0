//! Crate-wide error type.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by every client operation.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was empty or could not be encoded.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed configuration value or endpoint.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection-level failure talking to the sidecar.
    #[error("transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    /// Failure reading a response body.
    #[error("response body error: {0}")]
    Body(#[from] hyper::Error),

    /// The request itself could not be built.
    #[error("http error: {0}")]
    Http(#[from] http::Error),

    /// The sidecar answered with a non-success status.
    #[error("sidecar returned {status}: {body}")]
    Status { status: http::StatusCode, body: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Status code of a sidecar rejection, if this is one.
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
