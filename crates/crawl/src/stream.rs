use crate::adapter::{Adapter, Cursor};
use crate::download::{Downloaded, download_candidate, within};
use crate::error::{Error, ErrorKind, Result};
use crate::options::{CrawlOptions, Throttle};
use async_stream::stream;
use emomo_staging::{SourceId, Staging};
use exn::{OptionExt, ResultExt};
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::pin;

/// Outcome of a finished crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Items newly written to the staging area by this run.
    pub items_crawled: usize,
    /// Where to resume next time. `None` if this run made no progress.
    pub next_cursor: Option<Cursor>,
}

/// Progress events emitted by [`crawl`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) once.
/// 2. [`Seeded`](Self::Seeded) once, after the manifest has been read.
/// 3. [`PageFetched`](Self::PageFetched) zero or more times, possibly
///    followed by one [`PageFailed`](Self::PageFailed) or
///    [`EndOfContent`](Self::EndOfContent) which stops listing.
/// 4. [`DownloadsQueued`](Self::DownloadsQueued) once.
/// 5. [`Downloaded`](Self::Downloaded) or
///    [`DownloadFailed`](Self::DownloadFailed) once per queued item, in
///    completion order.
/// 6. [`Complete`](Self::Complete) once.
///
/// A fatal error (invalid options or cursor, unreadable manifest) is yielded
/// as an `Err` and ends the stream without [`Complete`](Self::Complete).
#[derive(Debug)]
pub enum CrawlEvent {
    Started { source: SourceId, cursor: Cursor },
    /// Ids already staged for this source, which won't be downloaded again.
    Seeded(usize),
    PageFetched {
        cursor: Cursor,
        /// Candidates on the page.
        found: usize,
        /// Candidates on the page not seen before.
        new: usize,
        /// Total candidates queued for download so far.
        queued: usize,
    },
    /// Listing stopped at `cursor`; a later run resumes from the same page.
    PageFailed { cursor: Cursor, error: Error },
    /// The page at `cursor` had no candidates.
    EndOfContent { cursor: Cursor },
    DownloadsQueued(usize),
    Downloaded(Downloaded),
    DownloadFailed { url: String, error: Error },
    Complete(CrawlSummary),
}

/// Streams [`CrawlEvent`]s while crawling `adapter` into `staging`.
///
/// Listing is strictly sequential and throttled: pages are fetched one at a
/// time until `options.limit` new candidates are queued, a page fails, or a
/// page comes back empty. Candidates whose id is already in the manifest (or
/// already queued by this run) are skipped. Downloads then run concurrently
/// up to `options.concurrency`, with more promoted as each one finishes.
///
/// Individual download failures are reported as
/// [`DownloadFailed`](CrawlEvent::DownloadFailed) and never stop the crawl.
pub fn crawl<'a>(
    adapter: &'a dyn Adapter,
    staging: &'a Staging,
    options: CrawlOptions,
) -> impl Stream<Item = Result<CrawlEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        if let Err(e) = options.validate() {
            yield Err(e);
            return;
        }
        let start = match options.cursor.as_deref().map(|raw| adapter.parse_cursor(raw)).transpose() {
            Ok(cursor) => cursor.unwrap_or_else(|| adapter.initial_cursor()),
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let source = adapter.source_id().clone();
        tracing::info!(%source, cursor = %start, limit = options.limit, "Starting crawl of {}", adapter.display_name());
        yield Ok(CrawlEvent::Started {
            source: source.clone(),
            cursor: start.clone(),
        });

        let mut seen = match staging.existing_ids(&source).await.or_raise(|| ErrorKind::Staging) {
            Ok(ids) => ids,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        yield Ok(CrawlEvent::Seeded(seen.len()));

        let throttle = Throttle::new(options.rate_limit);
        let mut cursor = start;
        let mut queue = Vec::new();
        while queue.len() < options.limit {
            throttle.wait().await;
            let listing = within(options.timeout, adapter.list_candidates(&cursor))
                .await
                .or_raise(|| ErrorKind::Listing(cursor.to_string()));
            let candidates = match listing {
                Ok(candidates) => candidates,
                Err(error) => {
                    tracing::warn!(%cursor, ?error, "Listing failed, stopping");
                    yield Ok(CrawlEvent::PageFailed { cursor: cursor.clone(), error });
                    break;
                },
            };
            if candidates.is_empty() {
                tracing::info!(%cursor, "No more content");
                yield Ok(CrawlEvent::EndOfContent { cursor: cursor.clone() });
                break;
            }
            let found = candidates.len();
            let before = queue.len();
            queue.extend(candidates.into_iter().filter(|candidate| seen.insert(candidate.id.clone())));
            let new = queue.len() - before;
            tracing::debug!(%cursor, found, new, "Fetched listing page");
            yield Ok(CrawlEvent::PageFetched {
                cursor: cursor.clone(),
                found,
                new,
                queued: queue.len(),
            });
            cursor = adapter.next_cursor(&cursor);
        }
        queue.truncate(options.limit);
        yield Ok(CrawlEvent::DownloadsQueued(queue.len()));

        let mut futures: VecDeque<_> = queue
            .into_iter()
            .map(|candidate| {
                let url = candidate.url.clone();
                let download = download_candidate(adapter, staging, &source, candidate, options.timeout);
                async move { download.await.map_err(|error| (url, error)) }
            })
            .collect();
        let mut processing = FuturesUnordered::new();
        processing.extend(futures.drain(..options.concurrency.min(futures.len())));
        let mut items_crawled = 0;
        while let Some(result) = processing.next().await {
            match result {
                Ok(downloaded) => {
                    items_crawled += 1;
                    yield Ok(CrawlEvent::Downloaded(downloaded));
                },
                Err((url, error)) => {
                    tracing::warn!(%url, ?error, "Download failed");
                    yield Ok(CrawlEvent::DownloadFailed { url, error });
                },
            }
            if let Some(next) = futures.pop_front() {
                processing.push(next);
            }
        }

        let summary = CrawlSummary {
            items_crawled,
            next_cursor: (items_crawled > 0).then_some(cursor),
        };
        tracing::info!(%source, items_crawled, next_cursor = ?summary.next_cursor, "Crawl complete");
        yield Ok(CrawlEvent::Complete(summary));
    })
}

/// Drive [`crawl`] to the end, passing every event to `on_event`.
pub async fn crawl_to_completion(
    adapter: &dyn Adapter,
    staging: &Staging,
    options: CrawlOptions,
    mut on_event: impl FnMut(&CrawlEvent),
) -> Result<CrawlSummary> {
    let mut events = pin!(crawl(adapter, staging, options));
    let mut summary = None;
    while let Some(event) = events.next().await {
        let event = event?;
        on_event(&event);
        if let CrawlEvent::Complete(complete) = event {
            summary = Some(complete);
        }
    }
    summary.ok_or_raise(|| ErrorKind::Incomplete)
}

impl dyn Adapter + '_ {
    /// Crawl this source into `staging` without observing progress.
    pub async fn crawl(&self, staging: &Staging, options: CrawlOptions) -> Result<CrawlSummary> {
        crawl_to_completion(self, staging, options, |_| {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdapterHandle, MockAdapter};
    use emomo_staging::{Format, item_id};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Staging) {
        let temp_dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(temp_dir.path()).unwrap();
        (temp_dir, staging)
    }

    fn demo() -> SourceId {
        SourceId::new("demo").unwrap()
    }

    fn two_pages() -> MockAdapter {
        MockAdapter::new("demo")
            .with_page(["https://x.test/1.gif", "https://x.test/2.jpg"])
            .with_page(["https://x.test/3.png", "https://x.test/4.webp"])
    }

    async fn events(adapter: &MockAdapter, staging: &Staging, options: CrawlOptions) -> Vec<CrawlEvent> {
        crawl(adapter, staging, options).map(|event| event.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_end_to_end_with_duplicates_on_page() {
        let (_temp_dir, staging) = setup();
        let adapter = MockAdapter::new("demo").with_page([
            "https://x.test/a.gif",
            "https://x.test/a.gif",
            "https://x.test/b.png",
            "https://x.test/a.gif",
            "https://x.test/c.jpg",
        ]);
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default().with_limit(3), |_| {})
            .await
            .unwrap();

        assert_eq!(summary.items_crawled, 3);
        assert_eq!(summary.next_cursor, Some(Cursor::new("2")));
        let manifest = std::fs::read_to_string(staging.manifest_path(&demo())).unwrap();
        assert_eq!(manifest.lines().count(), 3);
        let records = staging.read_all(&demo()).await.unwrap();
        let ids: HashSet<_> = records.iter().map(|record| record.id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_crawl_stops_at_limit() {
        let (_temp_dir, staging) = setup();
        let adapter = two_pages();
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default().with_limit(3), |_| {})
            .await
            .unwrap();

        assert_eq!(summary.items_crawled, 3);
        assert_eq!(summary.next_cursor, Some(Cursor::new("3")));
        assert_eq!(adapter.listed(), vec![Cursor::new("1"), Cursor::new("2")]);

        let records = staging.read_all(&demo()).await.unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            let image = staging.images_dir(&demo()).join(&record.filename);
            assert_eq!(std::fs::read(image).unwrap(), record.source_url.as_bytes());
        }
        // The fourth candidate was queued but cut by the limit.
        assert!(!records.iter().any(|record| record.id == item_id("https://x.test/4.webp")));
    }

    #[tokio::test]
    async fn test_repeated_crawls_never_duplicate() {
        let (_temp_dir, staging) = setup();
        let first = crawl_to_completion(&two_pages(), &staging, CrawlOptions::default().with_limit(3), |_| {})
            .await
            .unwrap();
        assert_eq!(first.items_crawled, 3);

        let adapter = two_pages();
        let second = crawl_to_completion(&adapter, &staging, CrawlOptions::default().with_limit(10), |_| {})
            .await
            .unwrap();
        assert_eq!(second.items_crawled, 1);
        // Page 3 was empty, so that's where to resume.
        assert_eq!(second.next_cursor, Some(Cursor::new("3")));
        assert_eq!(adapter.fetched(), vec!["https://x.test/4.webp".to_string()]);

        let third = crawl_to_completion(&two_pages(), &staging, CrawlOptions::default().with_limit(10), |_| {})
            .await
            .unwrap();
        assert_eq!(third.items_crawled, 0);
        assert_eq!(third.next_cursor, None);

        let records = staging.read_all(&demo()).await.unwrap();
        let ids: HashSet<_> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(records.len(), 4);
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn test_event_order() {
        let (_temp_dir, staging) = setup();
        let events = events(&two_pages(), &staging, CrawlOptions::default().with_limit(10)).await;

        assert!(matches!(&events[0], CrawlEvent::Started { source, cursor } if *source == demo() && cursor.as_str() == "1"));
        assert!(matches!(events[1], CrawlEvent::Seeded(0)));
        assert!(matches!(events[2], CrawlEvent::PageFetched { found: 2, new: 2, queued: 2, .. }));
        assert!(matches!(events[3], CrawlEvent::PageFetched { found: 2, new: 2, queued: 4, .. }));
        assert!(matches!(&events[4], CrawlEvent::EndOfContent { cursor } if cursor.as_str() == "3"));
        assert!(matches!(events[5], CrawlEvent::DownloadsQueued(4)));
        assert!(events[6..10].iter().all(|event| matches!(event, CrawlEvent::Downloaded(_))));
        assert!(matches!(&events[10], CrawlEvent::Complete(summary) if summary.items_crawled == 4));
        assert_eq!(events.len(), 11);
    }

    #[tokio::test]
    async fn test_page_failure_is_a_hard_stop() {
        let (_temp_dir, staging) = setup();
        let adapter = MockAdapter::new("demo")
            .with_page(["https://x.test/1.gif"])
            .with_failing_page()
            .with_page(["https://x.test/3.gif"]);
        let events = events(&adapter, &staging, CrawlOptions::default().with_limit(10)).await;

        // Page 3 is never requested; skipping ahead would lose page 2 forever.
        assert_eq!(adapter.listed(), vec![Cursor::new("1"), Cursor::new("2")]);
        assert!(events.iter().any(|event| matches!(
            event,
            CrawlEvent::PageFailed { cursor, error } if cursor.as_str() == "2" && error.is_retryable()
        )));
        let Some(CrawlEvent::Complete(summary)) = events.last() else {
            panic!("crawl did not complete");
        };
        assert_eq!(summary.items_crawled, 1);
        assert_eq!(summary.next_cursor, Some(Cursor::new("2")));
    }

    #[tokio::test]
    async fn test_zero_progress_has_no_cursor() {
        let (_temp_dir, staging) = setup();
        let adapter = MockAdapter::new("demo")
            .with_page(["https://x.test/1.gif", "https://x.test/2.gif"])
            .with_broken("https://x.test/1.gif")
            .with_broken("https://x.test/2.gif");
        let mut failures = 0;
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default(), |event| {
            if let CrawlEvent::DownloadFailed { error, .. } = event {
                assert!(matches!(&**error, ErrorKind::Download(_)));
                failures += 1;
            }
        })
        .await
        .unwrap();

        assert_eq!(failures, 2);
        assert_eq!(summary.items_crawled, 0);
        assert_eq!(summary.next_cursor, None);
        assert!(staging.read_all(&demo()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_failures_do_not_stop_others() {
        let (_temp_dir, staging) = setup();
        let adapter = two_pages().with_broken("https://x.test/2.jpg");
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default().with_concurrency(1), |_| {})
            .await
            .unwrap();
        assert_eq!(summary.items_crawled, 3);
        assert_eq!(adapter.fetched().len(), 4);
        let records = staging.read_all(&demo()).await.unwrap();
        assert!(!records.iter().any(|record| record.source_url.ends_with("2.jpg")));
    }

    #[tokio::test]
    async fn test_duplicates_within_a_page_download_once() {
        let (_temp_dir, staging) = setup();
        let adapter = MockAdapter::new("demo").with_page(["https://x.test/1.gif", "https://x.test/1.gif"]);
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default(), |_| {})
            .await
            .unwrap();
        assert_eq!(summary.items_crawled, 1);
        assert_eq!(adapter.fetched().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_from_cursor() {
        let (_temp_dir, staging) = setup();
        let adapter = two_pages();
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default().with_cursor(Some(" 2 ")), |_| {})
            .await
            .unwrap();
        assert_eq!(adapter.listed()[0], Cursor::new("2"));
        assert_eq!(summary.items_crawled, 2);
    }

    #[tokio::test]
    async fn test_invalid_cursor_fails_before_io() {
        let (_temp_dir, staging) = setup();
        let adapter = two_pages();
        let err = crawl_to_completion(&adapter, &staging, CrawlOptions::default().with_cursor(Some("soon")), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidCursor(_)));
        assert!(adapter.listed().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_io() {
        let (_temp_dir, staging) = setup();
        let adapter = two_pages();
        let mut events = crawl(&adapter, &staging, CrawlOptions::default().with_concurrency(0)).collect::<Vec<_>>().await;
        assert_eq!(events.len(), 1);
        let err = events.remove(0).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidOptions(_)));
        assert!(adapter.listed().is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_lists_nothing() {
        let (_temp_dir, staging) = setup();
        let adapter = two_pages();
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default().with_limit(0), |_| {})
            .await
            .unwrap();
        assert_eq!(summary.items_crawled, 0);
        assert_eq!(summary.next_cursor, None);
        assert!(adapter.listed().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_manifest_is_fatal() {
        let (_temp_dir, staging) = setup();
        // A directory where the manifest should be can't be read as a file.
        std::fs::create_dir_all(staging.manifest_path(&demo())).unwrap();
        let adapter = two_pages();
        let err = crawl_to_completion(&adapter, &staging, CrawlOptions::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Staging));
        assert!(adapter.listed().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let (_temp_dir, staging) = setup();
        let adapter = two_pages().with_stalled("https://x.test/3.png");
        let options = CrawlOptions::default().with_timeout(Some(Duration::from_millis(50)));
        let mut failed = Vec::new();
        let summary = crawl_to_completion(&adapter, &staging, options, |event| {
            if let CrawlEvent::DownloadFailed { url, .. } = event {
                failed.push(url.clone());
            }
        })
        .await
        .unwrap();
        assert_eq!(failed, vec!["https://x.test/3.png".to_string()]);
        assert_eq!(summary.items_crawled, 3);
    }

    #[tokio::test]
    async fn test_content_type_refines_format() {
        let (_temp_dir, staging) = setup();
        let adapter = MockAdapter::new("demo")
            .with_page(["https://x.test/image?id=1"])
            .with_content_type("https://x.test/image?id=1", "image/gif");
        crawl_to_completion(&adapter, &staging, CrawlOptions::default(), |_| {})
            .await
            .unwrap();
        let records = staging.read_all(&demo()).await.unwrap();
        assert_eq!(records[0].format, Format::Gif);
        assert!(records[0].is_animated);
        assert!(records[0].filename.ends_with(".gif"));
    }

    #[tokio::test]
    async fn test_crawl_through_handle() {
        let (_temp_dir, staging) = setup();
        let handle: AdapterHandle = Arc::new(two_pages());
        let summary = handle.crawl(&staging, CrawlOptions::default().with_limit(2)).await.unwrap();
        assert_eq!(summary.items_crawled, 2);
        assert_eq!(summary.next_cursor, Some(Cursor::new("2")));
    }

    #[tokio::test]
    async fn test_throttled_crawl_still_completes() {
        let (_temp_dir, staging) = setup();
        let options = CrawlOptions::default().with_rate_limit(Some(100.0));
        let summary = crawl_to_completion(&two_pages(), &staging, options, |_| {})
            .await
            .unwrap();
        assert_eq!(summary.items_crawled, 4);
    }

    #[tokio::test]
    async fn test_skips_items_from_existing_manifest() {
        let (_temp_dir, staging) = setup();
        // A line as written by the earlier crawler, id = md5(url)[:16].
        let line = r#"{"id":"b9ad6a893860daaf","filename":"b9ad6a893860daaf.gif","category":"表情包","tags":[],"source_url":"https://x.test/1.gif","is_animated":true,"format":"gif","crawled_at":"2024-05-01T12:30:45.123456+00:00"}"#;
        std::fs::create_dir_all(staging.source_dir(&demo())).unwrap();
        std::fs::write(staging.manifest_path(&demo()), format!("{line}\n")).unwrap();

        let adapter = MockAdapter::new("demo").with_page(["https://x.test/1.gif", "https://x.test/2.gif"]);
        let summary = crawl_to_completion(&adapter, &staging, CrawlOptions::default(), |_| {})
            .await
            .unwrap();

        assert_eq!(summary.items_crawled, 1);
        assert_eq!(adapter.fetched(), vec!["https://x.test/2.gif".to_string()]);
        let records = staging.read_all(&demo()).await.unwrap();
        assert_eq!(records.iter().filter(|record| record.source_url == "https://x.test/1.gif").count(), 1);
        assert_eq!(records.len(), 2);
    }
}
