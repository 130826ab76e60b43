//! Manifest store.
//!
//! Each source keeps a JSON Lines log of [`ItemRecord`]s. The log is only
//! ever appended to: lines are never edited or removed in place, and the only
//! way to forget a record is to [`clean`](Staging::clean) the whole source.
//!
//! Appends open, write and close the file every time so that concurrent
//! download workers never share a handle; ordering between them is whatever
//! the filesystem's append semantics give us. There is no cross-process lock.

use crate::error::{ErrorKind, Result};
use crate::{ItemRecord, SourceId, Staging};
use exn::ResultExt;
use memchr::memchr_iter;
use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;

impl Staging {
    /// Append one record to the source's manifest.
    ///
    /// No existence check or deduplication happens here; callers are
    /// responsible for never appending the same id twice. The line is
    /// flushed and synced before returning.
    ///
    /// If a previous crash left an unterminated line at the end of the file,
    /// a newline is written first so the new record starts on its own line.
    #[instrument(skip(self, record), fields(source = %source, id = %record.id))]
    pub async fn append(&self, source: &SourceId, record: &ItemRecord) -> Result<()> {
        self.ensure_directories(source).await?;
        let path = self.manifest_path(source);

        let mut line = Vec::with_capacity(256);
        line.push(b'\n');
        serde_json::to_writer(&mut line, record).or_raise(|| ErrorKind::Serialize)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| ErrorKind::from_io(e, &path))?;
        let skip = match Self::ends_with_newline(&mut file).await.map_err(|e| ErrorKind::from_io(e, &path))? {
            true => 1,
            false => 0,
        };
        // One write per record; append mode puts it at the end regardless of
        // where the cursor was left by the newline check.
        file.write_all(&line[skip..]).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        file.flush().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        file.sync_data().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        Ok(())
    }

    /// Empty files count as newline-terminated.
    async fn ends_with_newline(file: &mut fs::File) -> std::io::Result<bool> {
        let len = file.metadata().await?.len();
        if len == 0 {
            return Ok(true);
        }
        file.seek(SeekFrom::Start(len - 1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] == b'\n')
    }

    /// Read every well-formed record in append order.
    ///
    /// A missing manifest is an empty source. Lines that fail to parse (most
    /// likely a partially-written trailing line left by a crash) are logged
    /// and skipped, never raised.
    #[instrument(skip(self), fields(source = %source))]
    pub async fn read_all(&self, source: &SourceId) -> Result<Vec<ItemRecord>> {
        let path = self.manifest_path(source);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => exn::bail!(ErrorKind::from_io(e, &path)),
        };
        Ok(parse_manifest(&bytes, &path))
    }

    /// Set of every id currently recorded for the source.
    pub async fn existing_ids(&self, source: &SourceId) -> Result<HashSet<String>> {
        Ok(self.read_all(source).await?.into_iter().map(|record| record.id).collect())
    }

    /// Sources are the directories directly beneath the staging root that
    /// contain a manifest. Sorted by name.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn list_sources(&self) -> Result<Vec<SourceId>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => exn::bail!(ErrorKind::from_io(e, &self.root)),
        };
        let mut sources = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, &self.root))? {
            let path = entry.path();
            let is_dir = entry.file_type().await.map_err(|e| ErrorKind::from_io(e, &path))?.is_dir();
            if !is_dir {
                continue;
            }
            // Directories that could never have been written by a valid
            // source (non-UTF-8 names and the like) are not ours.
            let Some(source) = entry.file_name().to_str().and_then(|name| SourceId::new(name).ok()) else {
                continue;
            };
            if fs::try_exists(self.manifest_path(&source)).await.unwrap_or(false) {
                sources.push(source);
            }
        }
        sources.sort();
        Ok(sources)
    }

    /// Irreversibly delete everything staged for a source. Cleaning a source
    /// that doesn't exist is a no-op.
    #[instrument(skip(self), fields(source = %source))]
    pub async fn clean(&self, source: &SourceId) -> Result<()> {
        Self::remove_tree(&self.source_dir(source)).await
    }

    /// Irreversibly delete the whole staging root.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn clean_all(&self) -> Result<()> {
        Self::remove_tree(&self.root).await
    }

    async fn remove_tree(path: &Path) -> Result<()> {
        match fs::remove_dir_all(path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Removed staging data");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => exn::bail!(ErrorKind::from_io(e, path)),
        }
    }
}

/// Parse JSON Lines, skipping blank and malformed lines.
fn parse_manifest(bytes: &[u8], path: &Path) -> Vec<ItemRecord> {
    let mut records = Vec::new();
    let mut start = 0;
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for (index, end) in ends.enumerate() {
        if start > end {
            break;
        }
        let line = bytes[start..end].trim_ascii();
        start = end + 1;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<ItemRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "Skipping unparseable manifest line"
            ),
        }
    }
    records
}
