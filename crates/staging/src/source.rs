//! Source identifier validation.
//!
//! A source owns exactly one directory directly beneath the staging root, so
//! its identifier must be a single, plain path component. Anything else could
//! escape the root or alias another source.

use crate::error::{Error, ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Component, Path};
use std::str::FromStr;

/// A validated source namespace identifier.
///
/// # Examples
///
/// ```
/// use emomo_staging::SourceId;
/// // Valid identifiers
/// assert!(SourceId::new("fabiaoqing").is_ok());
/// assert!(SourceId::new("demo-2").is_ok());
/// // Invalid identifiers
/// assert!(SourceId::new("").is_err());
/// assert!(SourceId::new("..").is_err());
/// assert!(SourceId::new("a/b").is_err());
/// assert!(SourceId::new("a\0b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);
impl SourceId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        // Null bytes pass through Path::components() on Unix but cause
        // truncation in C-based syscalls; reject them explicitly.
        if id.contains('\0') || id.contains('\\') {
            exn::bail!(ErrorKind::InvalidSource(id));
        }
        let mut components = Path::new(&id).components();
        let single = match (components.next(), components.next()) {
            // Path::components() quietly drops trailing slashes.
            (Some(Component::Normal(name)), None) => name == id.as_str(),
            _ => false,
        };
        match single {
            true => Ok(Self(id)),
            false => exn::bail!(ErrorKind::InvalidSource(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl FromStr for SourceId {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}
impl TryFrom<&str> for SourceId {
    type Error = Error;
    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}
impl AsRef<Path> for SourceId {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("fabiaoqing")]
    #[case("demo")]
    #[case("source_2")]
    #[case("发表情")]
    fn test_valid(#[case] id: &str) {
        assert_eq!(SourceId::new(id).unwrap().as_str(), id);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("/abs")]
    #[case("trailing/")]
    #[case("./demo")]
    #[case("a\\b")]
    #[case("a\0b")]
    fn test_invalid(#[case] id: &str) {
        let err = SourceId::new(id).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidSource(_)));
    }
}
