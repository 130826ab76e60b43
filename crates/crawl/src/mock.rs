//! Scripted in-memory adapter for testing.

use crate::adapter::{Adapter, Candidate, Cursor, Fetched};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use emomo_staging::SourceId;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

enum Page {
    Items(Vec<Candidate>),
    Fail,
}

/// Adapter that serves pre-scripted listing pages and echoes each URL back
/// as the image bytes.
///
/// Cursors are 1-based page numbers. Pages beyond the script are empty,
/// which the orchestrator treats as end of content.
///
/// # Examples
///
/// ```
/// use emomo_crawl::MockAdapter;
///
/// let adapter = MockAdapter::new("demo")
///     .with_page(["https://x.test/1.gif", "https://x.test/2.png"])
///     .with_failing_page()
///     .with_broken("https://x.test/2.png");
/// ```
pub struct MockAdapter {
    source: SourceId,
    pages: Vec<Page>,
    broken: HashSet<String>,
    stalled: HashSet<String>,
    flaky: HashMap<String, (u32, Duration)>,
    content_types: HashMap<String, String>,
    listed: Mutex<Vec<Cursor>>,
    fetched: Mutex<Vec<String>>,
}

impl MockAdapter {
    /// Panics if `source` isn't a valid source id. If test setup is wrong,
    /// then the test should not pass.
    pub fn new(source: &str) -> Self {
        let Ok(source) = SourceId::new(source) else {
            panic!("MockAdapter::new: invalid source {source:?}");
        };
        Self {
            source,
            pages: Vec::new(),
            broken: HashSet::new(),
            stalled: HashSet::new(),
            flaky: HashMap::new(),
            content_types: HashMap::new(),
            listed: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Append a listing page with one candidate per URL.
    pub fn with_page<'a>(mut self, urls: impl IntoIterator<Item = &'a str>) -> Self {
        let candidates = urls.into_iter().map(|url| Candidate::new(url, "mock", vec![])).collect();
        self.pages.push(Page::Items(candidates));
        self
    }

    /// Append a listing page that always fails.
    pub fn with_failing_page(mut self) -> Self {
        self.pages.push(Page::Fail);
        self
    }

    /// Fetching `url` fails.
    pub fn with_broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    /// Fetching `url` never completes.
    pub fn with_stalled(mut self, url: &str) -> Self {
        self.stalled.insert(url.to_string());
        self
    }

    /// Fetching `url` succeeds after `failures` attempts that each use up
    /// `per_attempt`, like a retrying client whose first tries time out.
    pub fn with_flaky(mut self, url: &str, failures: u32, per_attempt: Duration) -> Self {
        self.flaky.insert(url.to_string(), (failures, per_attempt));
        self
    }

    pub fn with_content_type(mut self, url: &str, content_type: &str) -> Self {
        self.content_types.insert(url.to_string(), content_type.to_string());
        self
    }

    /// Cursors of every listing request so far, in order.
    pub fn listed(&self) -> Vec<Cursor> {
        self.listed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// URLs of every fetch request so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn page_number(&self, cursor: &Cursor) -> Result<usize> {
        match cursor.as_str().parse::<usize>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => exn::bail!(ErrorKind::InvalidCursor(cursor.to_string())),
        }
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn source_id(&self) -> &SourceId {
        &self.source
    }

    fn display_name(&self) -> &str {
        "Mock"
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::new("1")
    }

    fn parse_cursor(&self, raw: &str) -> Result<Cursor> {
        let cursor = Cursor::new(raw.trim());
        self.page_number(&cursor)?;
        Ok(cursor)
    }

    fn next_cursor(&self, cursor: &Cursor) -> Cursor {
        let page = self.page_number(cursor).unwrap_or(1);
        Cursor::new((page + 1).to_string())
    }

    async fn list_candidates(&self, cursor: &Cursor) -> Result<Vec<Candidate>> {
        self.listed.lock().unwrap_or_else(PoisonError::into_inner).push(cursor.clone());
        let page = self.page_number(cursor)?;
        match self.pages.get(page - 1) {
            Some(Page::Items(candidates)) => Ok(candidates.clone()),
            Some(Page::Fail) => exn::bail!(ErrorKind::Listing(cursor.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Fetched> {
        self.fetched.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_string());
        if self.stalled.contains(url) {
            std::future::pending::<()>().await;
        }
        if let Some(&(failures, per_attempt)) = self.flaky.get(url) {
            for attempt in 1..=failures {
                tokio::time::sleep(per_attempt).await;
                tracing::debug!(url, attempt, "Mock attempt failed, retrying");
            }
        }
        if self.broken.contains(url) {
            exn::bail!(ErrorKind::Download(url.to_string()));
        }
        Ok(Fetched {
            bytes: url.as_bytes().to_vec(),
            content_type: self.content_types.get(url).cloned(),
        })
    }
}
