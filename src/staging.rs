use crate::cli::StagingCommand;
use crate::error::{ErrorKind, Result};
use emomo_staging::{SourceId, Staging, StagingStats};
use exn::ResultExt;
use std::io::{BufRead, Write};

const TOP_CATEGORIES: usize = 10;

pub async fn run(command: StagingCommand, staging: &Staging, out: &mut impl Write, input: &mut impl BufRead) -> Result<()> {
    match command {
        StagingCommand::List => list(staging, out).await,
        StagingCommand::Stats { source } => stats(staging, &source_id(&source)?, out).await,
        StagingCommand::Clean { source, yes } => clean(staging, &source_id(&source)?, yes, out, input).await,
        StagingCommand::CleanAll { yes } => clean_all(staging, yes, out, input).await,
    }
}

fn source_id(name: &str) -> Result<SourceId> {
    SourceId::new(name).or_raise(|| ErrorKind::Staging)
}

async fn list(staging: &Staging, out: &mut impl Write) -> Result<()> {
    let sources = staging.list_sources().await.or_raise(|| ErrorKind::Staging)?;
    if sources.is_empty() {
        writeln!(out, "No sources in staging ({}).", staging.root().display()).or_raise(|| ErrorKind::Terminal)?;
        return Ok(());
    }
    for source in sources {
        writeln!(out, "{source}\t{}", staging.source_dir(&source).display()).or_raise(|| ErrorKind::Terminal)?;
    }
    Ok(())
}

async fn stats(staging: &Staging, source: &SourceId, out: &mut impl Write) -> Result<()> {
    let stats = staging.stats(source).await.or_raise(|| ErrorKind::Staging)?;
    write_stats(&stats, out).or_raise(|| ErrorKind::Terminal)
}

fn write_stats(stats: &StagingStats, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Source: {}", stats.source_id)?;
    writeln!(out, "Total images: {}", stats.total_images)?;
    writeln!(out, "Total size: {:.2} MB", stats.total_size_bytes as f64 / (1024.0 * 1024.0))?;
    if !stats.categories.is_empty() {
        writeln!(out, "Top categories:")?;
        for (category, count) in stats.top_categories(TOP_CATEGORIES) {
            writeln!(out, "  {category}: {count}")?;
        }
    }
    if !stats.formats.is_empty() {
        writeln!(out, "Formats:")?;
        for (format, count) in &stats.formats {
            writeln!(out, "  {format}: {count}")?;
        }
    }
    Ok(())
}

async fn clean(
    staging: &Staging,
    source: &SourceId,
    yes: bool,
    out: &mut impl Write,
    input: &mut impl BufRead,
) -> Result<()> {
    let sources = staging.list_sources().await.or_raise(|| ErrorKind::Staging)?;
    if !sources.contains(source) {
        writeln!(out, "Source '{source}' not found in staging.").or_raise(|| ErrorKind::Terminal)?;
        return Ok(());
    }
    let question = format!("Delete all staged data for '{source}'?");
    if !yes && !confirm(&question, out, input).or_raise(|| ErrorKind::Terminal)? {
        writeln!(out, "Aborted.").or_raise(|| ErrorKind::Terminal)?;
        return Ok(());
    }
    staging.clean(source).await.or_raise(|| ErrorKind::Staging)?;
    writeln!(out, "Cleaned '{source}'.").or_raise(|| ErrorKind::Terminal)
}

async fn clean_all(staging: &Staging, yes: bool, out: &mut impl Write, input: &mut impl BufRead) -> Result<()> {
    let question = format!("Delete the entire staging area at {}?", staging.root().display());
    if !yes && !confirm(&question, out, input).or_raise(|| ErrorKind::Terminal)? {
        writeln!(out, "Aborted.").or_raise(|| ErrorKind::Terminal)?;
        return Ok(());
    }
    staging.clean_all().await.or_raise(|| ErrorKind::Staging)?;
    writeln!(out, "Cleaned all staging data.").or_raise(|| ErrorKind::Terminal)
}

/// Ask a yes/no question, defaulting to no.
fn confirm(question: &str, out: &mut impl Write, input: &mut impl BufRead) -> std::io::Result<bool> {
    write!(out, "{question} [y/N] ")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
