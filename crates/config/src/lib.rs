//! Configuration loading and validation.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults,
//! 2. an optional configuration file (TOML, YAML or JSON, chosen by
//!    extension),
//! 3. environment variables prefixed with `EMOMO_`, using `__` to reach
//!    nested keys (`EMOMO_CRAWL__THREADS=8`).
//!
//! Command-line flags are applied on top by the binary. The resulting
//! [`Config`] is passed down explicitly; nothing here is global.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "EMOMO_";
/// Retry backoff is randomised by up to this fraction either way.
pub const RETRY_JITTER: f64 = 0.25;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub staging: StagingConfig,
    pub crawl: CrawlConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Root of the staging area.
    pub path: PathBuf,
}
impl Default for StagingConfig {
    fn default() -> Self {
        let path = ProjectDirs::from("", "", "emomo")
            .map(|dirs| dirs.data_dir().join("staging"))
            .unwrap_or_else(|| PathBuf::from("data").join("staging"));
        Self { path }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Default maximum number of new items per crawl.
    pub limit: usize,
    /// Listing requests per second.
    pub rate_limit: f64,
    /// Concurrent image downloads.
    pub threads: usize,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
}
impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            rate_limit: 2.0,
            threads: 5,
            timeout_secs: 15,
        }
    }
}
impl CrawlConfig {
    /// Timeout of a single HTTP attempt.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
    /// Pin TLS 1.2 and skip certificate verification. Some meme sites
    /// only negotiate with legacy TLS configurations.
    pub insecure_tls: bool,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}
impl HttpConfig {
    /// Nominal backoff before retry number `attempt + 1`: the base delay
    /// doubled per attempt, capped at the maximum delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(Duration::from_millis(self.retry_max_delay_ms))
    }

    /// Longest a request can take when every attempt uses its full
    /// `per_attempt` timeout and every backoff is jittered upwards.
    pub fn retry_budget(&self, per_attempt: Duration) -> Duration {
        (0..self.max_retries).fold(per_attempt, |budget, attempt| {
            budget
                .saturating_add(self.backoff(attempt).mul_f64(1.0 + RETRY_JITTER))
                .saturating_add(per_attempt)
        })
    }
}
impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            insecure_tls: true,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8000,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the
    /// environment, then validate it.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?
            .extract()
            .map_err(|e| ErrorKind::Load(e.to_string()))?;
        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// The layered provider stack, exposed so callers can merge extra
    /// layers before extracting.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            // Use non-async here; it's a one-off check at startup.
            if !file.is_file() {
                exn::bail!(ErrorKind::Missing(file.to_path_buf()));
            }
            let extension = file.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file_exact(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
                Some("json") => figment.merge(Json::file_exact(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFile(file.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Upper bound on one page listing or image download, retries included.
    pub fn operation_timeout(&self) -> Duration {
        self.http.retry_budget(self.crawl.timeout())
    }

    pub fn validate(&self) -> Result<()> {
        if self.staging.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid {
                field: "staging.path",
                reason: "must not be empty",
            });
        }
        if !self.crawl.rate_limit.is_finite() || self.crawl.rate_limit <= 0.0 {
            exn::bail!(ErrorKind::Invalid {
                field: "crawl.rate_limit",
                reason: "must be a positive number of requests per second",
            });
        }
        if self.crawl.threads == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "crawl.threads",
                reason: "must be at least 1",
            });
        }
        if self.crawl.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "crawl.timeout_secs",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
