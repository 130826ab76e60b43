//! Local staging area for crawled memes.
//!
//! The staging area is the durable holding place between crawling and
//! ingestion. Every source gets its own directory with an append-only
//! `manifest.jsonl` record log and an `images/` directory:
//!
//! ```text
//! {root}/{source}/manifest.jsonl
//! {root}/{source}/images/{id}.{format}
//! ```
//!
//! The manifest is the source of truth for *what was crawled*; the images
//! directory is the source of truth for *what is still present*. Crashes may
//! leave a half-written trailing line in a manifest, which readers skip.

pub mod error;
mod layout;
mod manifest;
mod record;
mod source;
mod stats;

pub use crate::layout::{IMAGES_DIR, MANIFEST_FILE_NAME};
pub use crate::record::{Format, ID_LENGTH, ItemRecord, item_id};
pub use crate::source::SourceId;
pub use crate::stats::{StagedPage, StagingStats};
use std::path::PathBuf;

/// Handle on a staging root directory.
///
/// Cheap to clone; holds no open files and no in-memory state beyond the
/// root path, so independent handles on the same root never disagree.
#[derive(Debug, Clone)]
pub struct Staging {
    root: PathBuf,
}
