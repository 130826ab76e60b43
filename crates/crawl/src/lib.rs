//! Resumable, deduplicating crawls into the staging area.
//!
//! A crawl pages through a site's listings via an [`Adapter`], skips every
//! item already recorded in the source's manifest, downloads the rest with
//! bounded concurrency and appends one manifest record per staged image. The
//! returned [`CrawlSummary`] carries the cursor to resume from next time.
//!
//! ```text
//! Started -> Seeded -> PageFetched* -> DownloadsQueued -> Downloaded* -> Complete
//! ```

pub mod adapter;
mod download;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod options;
mod stream;

pub use crate::adapter::{Adapter, AdapterHandle, Candidate, Cursor, Fetched};
pub use crate::download::Downloaded;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockAdapter;
pub use crate::options::{CrawlOptions, Throttle};
pub use crate::stream::{CrawlEvent, CrawlSummary, crawl, crawl_to_completion};

