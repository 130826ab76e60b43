//! Site adapters for the crawl orchestrator.
//!
//! Each adapter turns a site's listing pages into [`Candidate`]s and fetches
//! their image bytes over a shared, retrying [`HttpClient`]. Use
//! [`registry::build`] to get one by name.
//!
//! [`Candidate`]: emomo_crawl::Candidate

mod consts;
pub mod error;
pub mod fabiaoqing;
mod http;
pub mod registry;

pub use crate::fabiaoqing::Fabiaoqing;
pub use crate::http::HttpClient;
pub use crate::registry::{available, build};
