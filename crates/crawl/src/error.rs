//! Crawl Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Most of these never escape a crawl: page and download failures are
//! reported through [`CrawlEvent`](crate::CrawlEvent)s and absorbed. Only
//! configuration problems and an unreadable manifest end a crawl early.

use derive_more::{Display, Error};
use std::time::Duration;

/// A crawl error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for crawl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
///
/// ### Configuration Errors
/// - [`ErrorKind::InvalidCursor`]
/// - [`ErrorKind::InvalidOptions`]
///
/// ### Transient Fetch Errors
/// - [`ErrorKind::Listing`]
/// - [`ErrorKind::Download`]
/// - [`ErrorKind::Timeout`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Staging`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resumption cursor doesn't mean anything to the adapter.
    #[display("invalid cursor: {_0:?}")]
    InvalidCursor(#[error(not(source))] String),
    /// Crawl options are out of range.
    #[display("invalid crawl options: {_0}")]
    InvalidOptions(#[error(not(source))] &'static str),
    /// A listing page could not be fetched or understood.
    #[display("failed to fetch listing page {_0}")]
    Listing(#[error(not(source))] String),
    /// Image bytes could not be fetched or staged.
    #[display("failed to download {_0}")]
    Download(#[error(not(source))] String),
    /// A network operation took longer than allowed.
    #[display("timed out after {_0:?}")]
    Timeout(#[error(not(source))] Duration),
    /// Reading from or writing to the staging area failed.
    #[display("staging error")]
    Staging,
    /// The crawl stream ended without reporting a summary.
    #[display("crawl ended without completing")]
    Incomplete,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Listing(_) | Self::Download(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Listing("3".to_string()).is_retryable());
        assert!(ErrorKind::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ErrorKind::InvalidCursor("abc".to_string()).is_retryable());
        assert!(!ErrorKind::Staging.is_retryable());
    }
}
