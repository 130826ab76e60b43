//! Staging Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A staging error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for staging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Source identifier is empty, contains separators, or would escape the
    /// staging root.
    #[display("invalid source id: {_0:?}")]
    InvalidSource(#[error(not(source))] String),
    /// Staging root is empty or exists as something other than a directory.
    #[display("invalid staging root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Image file name is not a single plain path component.
    #[display("invalid image filename: {_0:?}")]
    InvalidFilename(#[error(not(source))] String),
    /// Unrecognised image format name.
    #[display("unsupported image format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// Access denied on a staging path.
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A record could not be turned into a manifest line.
    #[display("failed to serialize manifest record")]
    Serialize,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Map an I/O error for `path` onto the closest actionable category.
    pub(crate) fn from_io(err: IoError, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidSource("../x".to_string()).to_string(), r#"invalid source id: "../x""#);
        assert_eq!(ErrorKind::UnsupportedFormat("bmp".to_string()).to_string(), "unsupported image format: bmp");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::InvalidSource(String::new()).is_retryable());
        assert!(ErrorKind::Io(IoError::other("disk on fire")).is_retryable());
    }
}
