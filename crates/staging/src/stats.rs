//! Per-source statistics and read-back of staged items.
//!
//! The manifest says what was crawled, the filesystem says what is still
//! present. The two are allowed to drift apart (someone deleted an image by
//! hand) without anything here failing.

use crate::error::Result;
use crate::{Format, ItemRecord, SourceId, Staging};
use std::collections::BTreeMap;
use tokio::fs;
use tracing::instrument;

/// Derived statistics for one source. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingStats {
    pub source_id: SourceId,
    /// Every record in the manifest, whether or not its file still exists.
    pub total_images: u64,
    /// Sum of the on-disk sizes of the images that still exist.
    pub total_size_bytes: u64,
    pub categories: BTreeMap<String, u64>,
    pub formats: BTreeMap<Format, u64>,
}
impl StagingStats {
    /// The `n` most common categories, largest first, ties broken by name.
    pub fn top_categories(&self, n: usize) -> Vec<(&str, u64)> {
        let mut categories: Vec<_> = self.categories.iter().map(|(name, count)| (name.as_str(), *count)).collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        categories.truncate(n);
        categories
    }
}

/// A page of staged items, see [`Staging::staged_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPage {
    pub items: Vec<ItemRecord>,
    /// Offset of the next page, `None` once everything has been returned.
    pub next: Option<usize>,
}

impl Staging {
    /// Compute counts and sizes for a source.
    ///
    /// Records whose image file is missing still count towards the totals
    /// and histograms, but contribute nothing to the byte total.
    #[instrument(skip(self), fields(source = %source))]
    pub async fn stats(&self, source: &SourceId) -> Result<StagingStats> {
        let records = self.read_all(source).await?;
        let mut stats = StagingStats {
            source_id: source.clone(),
            total_images: 0,
            total_size_bytes: 0,
            categories: BTreeMap::new(),
            formats: BTreeMap::new(),
        };
        for record in &records {
            stats.total_images += 1;
            *stats.categories.entry(record.category.clone()).or_default() += 1;
            *stats.formats.entry(record.format).or_default() += 1;
            if let Some(size) = self.image_size(source, record).await {
                stats.total_size_bytes += size;
            }
        }
        Ok(stats)
    }

    /// Records whose image file still exists, sorted by id.
    ///
    /// This is the view downstream ingestion works from; records that lost
    /// their file are silently left out.
    #[instrument(skip(self), fields(source = %source))]
    pub async fn staged(&self, source: &SourceId) -> Result<Vec<ItemRecord>> {
        let mut present = Vec::new();
        for record in self.read_all(source).await? {
            if self.image_size(source, &record).await.is_some() {
                present.push(record);
            }
        }
        present.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(present)
    }

    /// Page through [`staged`](Self::staged) by offset.
    pub async fn staged_page(&self, source: &SourceId, offset: usize, limit: usize) -> Result<StagedPage> {
        let mut items = self.staged(source).await?;
        let total = items.len();
        let end = offset.saturating_add(limit).min(total);
        let items = match offset < total {
            true => items.drain(offset..end).collect(),
            false => Vec::new(),
        };
        let next = (end < total && limit > 0).then_some(end);
        Ok(StagedPage { items, next })
    }

    /// Size of the record's image, or `None` if it isn't (or can't be)
    /// on disk.
    async fn image_size(&self, source: &SourceId, record: &ItemRecord) -> Option<u64> {
        let path = self.image_path(source, &record.filename)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Some(metadata.len()),
            Ok(_) => None,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "Could not stat staged image");
                }
                None
            },
        }
    }
}
