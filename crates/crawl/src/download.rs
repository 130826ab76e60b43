use crate::adapter::{Adapter, Candidate};
use crate::error::{ErrorKind, Result};
use emomo_staging::{Format, ItemRecord, SourceId, Staging};
use exn::ResultExt;
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

/// An item that made it all the way into the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub record: ItemRecord,
    pub size: u64,
}

/// Run `future`, failing with [`ErrorKind::Timeout`] if it takes longer than
/// `timeout`.
pub(crate) async fn within<T>(timeout: Option<Duration>, future: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| ErrorKind::Timeout(limit))?,
        None => future.await,
    }
}

/// Fetch, save and record a single candidate.
///
/// The image is written before the manifest line, so a crash in between
/// leaves an orphaned file rather than a record without an image. The
/// orphan is simply overwritten if the item is crawled again.
#[instrument(skip_all, fields(source = %source, id = %candidate.id))]
pub(crate) async fn download_candidate(
    adapter: &dyn Adapter,
    staging: &Staging,
    source: &SourceId,
    candidate: Candidate,
    timeout: Option<Duration>,
) -> Result<Downloaded> {
    let fetched = within(timeout, adapter.fetch_bytes(&candidate.url)).await?;
    // URL extension still wins; the content type only helps URLs without one.
    let format = Format::detect(&candidate.url, fetched.content_type.as_deref());
    let record = candidate.into_record(format);
    staging
        .save_image(source, &record.filename, &fetched.bytes)
        .await
        .or_raise(|| ErrorKind::Staging)?;
    staging.append(source, &record).await.or_raise(|| ErrorKind::Staging)?;
    tracing::debug!(filename = %record.filename, bytes = fetched.bytes.len(), "Staged item");
    Ok(Downloaded {
        record,
        size: fetched.bytes.len() as u64,
    })
}
