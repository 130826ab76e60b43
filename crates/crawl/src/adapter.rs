//! The boundary between the crawl orchestrator and a specific website.
//!
//! An [`Adapter`] knows how to page through a site's listings and how to fetch
//! image bytes. It never touches the staging area; the orchestrator in
//! [`crawl`](crate::crawl) is written once against this trait and shared by
//! every site.

use crate::error::Result;
use async_trait::async_trait;
use emomo_staging::{Format, ItemRecord, SourceId, item_id};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

/// Shared handle on any adapter.
pub type AdapterHandle = Arc<dyn Adapter>;

/// Category used when a site gives us nothing better.
pub const DEFAULT_CATEGORY: &str = "表情包";
/// Candidates carry at most this many tags.
pub const MAX_TAGS: usize = 5;

/// Opaque resumption token, e.g. a page number.
///
/// Only the adapter that issued a cursor knows what it means.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);
impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}
impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// An item discovered on a listing page, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub url: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Format as far as the URL alone can tell.
    pub format: Format,
}
impl Candidate {
    /// Build a candidate, deriving its id and URL-based format.
    ///
    /// Tags beyond [`MAX_TAGS`] are dropped; an empty category becomes
    /// [`DEFAULT_CATEGORY`].
    pub fn new(url: impl Into<String>, category: impl Into<String>, mut tags: Vec<String>) -> Self {
        let url = url.into();
        let category = category.into();
        tags.truncate(MAX_TAGS);
        Self {
            id: item_id(&url),
            format: Format::detect(&url, None),
            category: match category.trim().is_empty() {
                true => DEFAULT_CATEGORY.to_string(),
                false => category,
            },
            tags,
            url,
        }
    }

    /// Turn a downloaded candidate into the record that gets staged.
    pub fn into_record(self, format: Format) -> ItemRecord {
        ItemRecord::new(self.id, self.url, self.category, self.tags, format)
    }
}

/// Raw image bytes plus whatever the server claimed they were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Site-specific listing and download capabilities.
///
/// # Cursors
/// The orchestrator treats cursors as opaque. It asks the adapter for the
/// starting point, validates caller-supplied cursors through
/// [`parse_cursor`](Self::parse_cursor) before doing any I/O, and advances
/// with [`next_cursor`](Self::next_cursor) after every successful page.
///
/// # Failures
/// - [`list_candidates`](Self::list_candidates) returning `Err` is a hard
///   page failure: the orchestrator stops listing rather than skipping ahead.
/// - Returning `Ok` with no candidates means there is no more content.
/// - [`fetch_bytes`](Self::fetch_bytes) failures only drop that one item.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Namespace the crawled items are staged under.
    fn source_id(&self) -> &SourceId;

    /// Human-readable name, for presentation only.
    fn display_name(&self) -> &str;

    fn initial_cursor(&self) -> Cursor;

    /// Validate a caller-supplied cursor.
    ///
    /// Returns [`InvalidCursor`](crate::error::ErrorKind::InvalidCursor) if
    /// the token can't have been issued by this adapter.
    fn parse_cursor(&self, raw: &str) -> Result<Cursor>;

    fn next_cursor(&self, cursor: &Cursor) -> Cursor;

    /// Candidates found on the listing page at `cursor`, in page order.
    async fn list_candidates(&self, cursor: &Cursor) -> Result<Vec<Candidate>>;

    async fn fetch_bytes(&self, url: &str) -> Result<Fetched>;
}
