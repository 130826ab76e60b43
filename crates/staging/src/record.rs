//! Item record model.
//!
//! An [`ItemRecord`] is the canonical description of one staged image. Its
//! identity is derived from the URL the bytes came from, never from the bytes
//! themselves, so the same URL always maps onto the same manifest entry.

use crate::error::{Error, ErrorKind};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::OffsetDateTime;

/// Number of hex characters kept from the URL hash.
pub const ID_LENGTH: usize = 16;

/// Derive the stable item identifier for a source URL.
///
/// MD5 of the raw URL bytes, truncated to [`ID_LENGTH`] lowercase hex
/// characters, matching the ids in manifests written by earlier crawlers.
/// Used for identity and deduplication only, never integrity.
///
/// ```
/// use emomo_staging::item_id;
/// let id = item_id("https://example.com/a.gif");
/// assert_eq!(id.len(), 16);
/// assert_eq!(id, item_id("https://example.com/a.gif"));
/// ```
pub fn item_id(url: &str) -> String {
    let mut hex = format!("{:x}", Md5::digest(url.as_bytes()));
    hex.truncate(ID_LENGTH);
    hex
}

/// A supported image format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Jpg,
    Png,
    Gif,
    Webp,
}
impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Jpg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Webp => "webp",
        }
    }

    /// Only GIFs are treated as animated.
    pub fn is_animated(&self) -> bool {
        matches!(self, Format::Gif)
    }

    /// Classify the format of an image from its URL and an optional
    /// `Content-Type` hint.
    ///
    /// URL extension evidence always outranks header evidence. Within each
    /// kind of evidence the first match wins in the order gif, png, webp
    /// (then jpg for URLs). Falls back to [`Format::Jpg`].
    ///
    /// ```
    /// use emomo_staging::Format;
    /// assert_eq!(Format::detect("https://x.test/a.gif", Some("image/png")), Format::Gif);
    /// assert_eq!(Format::detect("https://x.test/a", Some("image/webp")), Format::Webp);
    /// assert_eq!(Format::detect("https://x.test/a", None), Format::Jpg);
    /// ```
    pub fn detect(url: &str, content_type: Option<&str>) -> Self {
        let url = url.to_lowercase();
        if url.contains(".gif") {
            return Format::Gif;
        }
        if url.contains(".png") {
            return Format::Png;
        }
        if url.contains(".webp") {
            return Format::Webp;
        }
        if url.contains(".jpg") || url.contains(".jpeg") {
            return Format::Jpg;
        }
        if let Some(content_type) = content_type.map(str::to_lowercase) {
            if content_type.contains("gif") {
                return Format::Gif;
            }
            if content_type.contains("png") {
                return Format::Png;
            }
            if content_type.contains("webp") {
                return Format::Webp;
            }
        }
        Format::Jpg
    }
}
impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for Format {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Format::Jpg),
            "png" => Ok(Format::Png),
            "gif" => Ok(Format::Gif),
            "webp" => Ok(Format::Webp),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

/// One staged asset, serialized as a single manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Stable identifier derived from [`source_url`](Self::source_url).
    pub id: String,
    /// Image file name relative to the source's images directory.
    pub filename: String,
    pub category: String,
    pub tags: Vec<String>,
    pub source_url: String,
    pub is_animated: bool,
    pub format: Format,
    #[serde(with = "time::serde::rfc3339")]
    pub crawled_at: OffsetDateTime,
}
impl ItemRecord {
    /// Build a record stamped with the current UTC time.
    ///
    /// The file name and animation flag are derived from `id` and `format`
    /// so they can never disagree with each other.
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        category: impl Into<String>,
        tags: Vec<String>,
        format: Format,
    ) -> Self {
        let id = id.into();
        Self {
            filename: Self::filename_for(&id, format),
            id,
            category: category.into(),
            tags,
            source_url: source_url.into(),
            is_animated: format.is_animated(),
            format,
            crawled_at: OffsetDateTime::now_utc(),
        }
    }

    /// `"{id}.{format}"`
    pub fn filename_for(id: &str, format: Format) -> String {
        format!("{id}.{format}")
    }
}
