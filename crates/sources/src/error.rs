//! Source Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No adapter is registered under this name.
    #[display("unknown source: {_0:?}")]
    UnknownSource(#[error(not(source))] String),
    /// The HTTP client could not be constructed.
    #[display("could not build HTTP client")]
    Client,
    /// The request could not be sent or its body could not be read.
    #[display("request to {_0} failed")]
    Request(#[error(not(source))] String),
    /// The server answered with a non-success status.
    #[display("{url} responded with HTTP {status}")]
    Status {
        #[error(not(source))]
        url: String,
        #[error(not(source))]
        status: u16,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::UnknownSource(_) | Self::Client => false,
        }
    }
}

/// Rate limiting and server-side failures, including Cloudflare's 52x range.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504 | 520..=527)
}
