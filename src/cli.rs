use clap::{ArgAction, Args, Parser, Subcommand};
use emomo_config::Config;
use emomo_crawl::CrawlOptions;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "emomo-crawler", version, about = "Crawl memes into a local staging area")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Staging root, overriding the configured one
    #[arg(long, global = true, value_name = "DIR")]
    pub staging_path: Option<PathBuf>,

    /// More logging; repeat for trace output
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl new items from a source
    Crawl(CrawlArgs),
    /// Inspect or clean the staging area
    #[command(subcommand)]
    Staging(StagingCommand),
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Source to crawl
    #[arg(short, long)]
    pub source: String,

    /// Maximum number of new items
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Resume from this cursor, as printed by a previous crawl
    #[arg(short, long)]
    pub cursor: Option<String>,

    /// Listing requests per second
    #[arg(long)]
    pub rate_limit: Option<f64>,

    /// Concurrent downloads
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

impl CrawlArgs {
    /// Flags win over configuration. The orchestrator's timeout spans a whole
    /// request, so it is sized to let the HTTP client use all its retries.
    pub fn options(&self, config: &Config) -> CrawlOptions {
        CrawlOptions::default()
            .with_limit(self.limit.unwrap_or(config.crawl.limit))
            .with_cursor(self.cursor.clone())
            .with_concurrency(self.threads.unwrap_or(config.crawl.threads))
            .with_rate_limit(Some(self.rate_limit.unwrap_or(config.crawl.rate_limit)))
            .with_timeout(Some(config.operation_timeout()))
    }
}

#[derive(Debug, Subcommand)]
pub enum StagingCommand {
    /// List sources with staged items
    List,
    /// Show statistics for a source
    Stats {
        #[arg(short, long)]
        source: String,
    },
    /// Delete everything staged for a source
    Clean {
        #[arg(short, long)]
        source: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete the whole staging area
    CleanAll {
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}
