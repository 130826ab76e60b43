use crate::error::{ErrorKind, Result};
use rand::Rng;
use std::time::Duration;

/// Per-invocation crawl settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOptions {
    /// Maximum number of *new* items to stage.
    pub limit: usize,
    /// Where to resume listing; the adapter's initial cursor when `None`.
    pub cursor: Option<String>,
    /// Maximum number of downloads in flight at once.
    pub concurrency: usize,
    /// Listing requests per second; no throttling when `None`.
    pub rate_limit: Option<f64>,
    /// Applied independently to every page and image fetch.
    pub timeout: Option<Duration>,
}
impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            cursor: None,
            concurrency: 5,
            rate_limit: None,
            timeout: None,
        }
    }
}
impl CrawlOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<impl Into<String>>) -> Self {
        self.cursor = cursor.map(Into::into);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: Option<f64>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::InvalidOptions("concurrency must be at least 1"));
        }
        if let Some(rate) = self.rate_limit
            && (!rate.is_finite() || rate <= 0.0)
        {
            exn::bail!(ErrorKind::InvalidOptions("rate limit must be a positive number"));
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            exn::bail!(ErrorKind::InvalidOptions("timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Randomised delay between listing requests.
///
/// Each wait sleeps somewhere between half and one-and-a-half times the
/// nominal interval `1 / rate`, so requests don't land on the remote server
/// in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Option<Duration>,
}
impl Throttle {
    pub fn new(rate_limit: Option<f64>) -> Self {
        let interval = rate_limit
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .map(|rate| Duration::from_secs_f64(1.0 / rate));
        Self { interval }
    }

    /// The next delay to sleep for, if throttling is enabled.
    pub fn next_delay(&self) -> Option<Duration> {
        // ThreadRng isn't Send; keep it out of any async state machine.
        let jitter = rand::thread_rng().gen_range(0.5..=1.5);
        self.interval.map(|interval| interval.mul_f64(jitter))
    }

    pub async fn wait(&self) {
        if let Some(delay) = self.next_delay() {
            tokio::time::sleep(delay).await;
        }
    }
}
