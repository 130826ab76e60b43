use crate::cli::CrawlArgs;
use crate::error::{ErrorKind, Result};
use emomo_config::Config;
use emomo_crawl::{Adapter, CrawlEvent, CrawlOptions, CrawlSummary, crawl_to_completion};
use emomo_staging::Staging;
use exn::ResultExt;
use std::io::Write;

pub async fn run(args: CrawlArgs, config: &Config, staging: &Staging, out: &mut impl Write) -> Result<()> {
    let adapter = emomo_sources::build(&args.source, config).or_raise(|| ErrorKind::Source)?;
    let options = args.options(config);
    writeln!(out, "Crawling {} (limit {})", adapter.display_name(), options.limit).or_raise(|| ErrorKind::Terminal)?;
    let summary = harvest(adapter.as_ref(), staging, options, out).await?;
    report(adapter.as_ref(), &summary, out).or_raise(|| ErrorKind::Terminal)
}

/// Crawl, echoing per-item progress to `out`.
async fn harvest(
    adapter: &dyn Adapter,
    staging: &Staging,
    options: CrawlOptions,
    out: &mut impl Write,
) -> Result<CrawlSummary> {
    crawl_to_completion(adapter, staging, options, |event| {
        let written = match event {
            CrawlEvent::Seeded(existing) => writeln!(out, "{existing} items already staged"),
            CrawlEvent::PageFetched { cursor, found, new, queued } => {
                writeln!(out, "  Page {cursor}: found {found}, new {new}, total {queued}")
            },
            CrawlEvent::PageFailed { cursor, .. } => writeln!(out, "  Page {cursor}: failed, stopping"),
            CrawlEvent::EndOfContent { cursor } => writeln!(out, "  Page {cursor}: no more items"),
            CrawlEvent::DownloadsQueued(count) => writeln!(out, "Downloading {count} images..."),
            CrawlEvent::Downloaded(downloaded) => writeln!(
                out,
                "  [OK] {} ({:.1} KB)",
                downloaded.record.filename,
                downloaded.size as f64 / 1024.0
            ),
            CrawlEvent::DownloadFailed { url, .. } => writeln!(out, "  [FAILED] {url}"),
            CrawlEvent::Started { .. } | CrawlEvent::Complete(_) => Ok(()),
        };
        // Progress output is best-effort; the crawl carries on regardless.
        if let Err(error) = written {
            tracing::debug!(?error, "Failed to write crawl progress");
        }
    })
    .await
    .or_raise(|| ErrorKind::Crawl)
}

fn report(adapter: &dyn Adapter, summary: &CrawlSummary, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Crawled {} items.", summary.items_crawled)?;
    match &summary.next_cursor {
        Some(cursor) => {
            writeln!(out, "Next cursor: {cursor}")?;
            writeln!(out, "Continue with: emomo-crawler crawl -s {} -c {cursor}", adapter.source_id())
        },
        None => writeln!(out, "No more items to crawl."),
    }
}
