//! Lookup of site adapters by name.

use crate::error::{ErrorKind, Result};
use crate::fabiaoqing::Fabiaoqing;
use emomo_config::Config;
use emomo_crawl::Adapter;

/// Names accepted by [`build`], in display order.
pub fn available() -> &'static [&'static str] {
    &[Fabiaoqing::ID]
}

/// Construct the adapter registered under `name`.
pub fn build(name: &str, config: &Config) -> Result<Box<dyn Adapter>> {
    match name {
        Fabiaoqing::ID => Ok(Box::new(Fabiaoqing::new(config)?)),
        _ => exn::bail!(ErrorKind::UnknownSource(name.to_string())),
    }
}
