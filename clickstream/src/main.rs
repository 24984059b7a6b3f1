//! clickstream-report - activity log analytics CLI
//!
//! Runs every analysis over a JSON-lines event log and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use clickstream_core::analytics::{Report, RoundingPolicy};
use clickstream_core::{ingest, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clickstream-report")]
#[command(about = "Windowed and grouped analytics over a clickstream log")]
#[command(version)]
struct Args {
    /// JSON-lines event log
    input: PathBuf,

    /// Output format (text, md = markdown, json = JSON)
    #[arg(long, default_value = "text")]
    format: String,

    /// Fixed UTC offset for hour-of-day bucketing (e.g. "+05:30", "UTC")
    #[arg(long)]
    utc_offset: Option<String>,

    /// Rounding for averages (half_even or half_up)
    #[arg(long)]
    rounding: Option<String>,

    /// Number of top artists to list
    #[arg(long)]
    top: Option<usize>,

    /// Gender whose distinct users are counted (empty string to skip)
    #[arg(long)]
    gender: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/clickstream/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    let _log_guard = clickstream_core::logging::init(&config.logging).ok();

    // Command-line flags win over the config file
    if let Some(offset) = &args.utc_offset {
        config.time.utc_offset = offset.clone();
    }
    if let Some(rounding) = &args.rounding {
        config.report.rounding = rounding
            .parse::<RoundingPolicy>()
            .context("invalid --rounding")?;
    }
    if let Some(top) = args.top {
        config.report.top_artists = top;
    }
    if let Some(gender) = &args.gender {
        config.report.gender = gender.clone();
    }

    let pipeline = config.pipeline_config().context("invalid configuration")?;
    let options = config.report_options();

    let records = ingest::load_event_log(&args.input)
        .with_context(|| format!("failed to read event log {}", args.input.display()))?;
    tracing::info!(records = records.len(), "Generating report");

    let report = Report::generate(&records, &pipeline, &options)
        .context("failed to generate report")?;

    match args.format.as_str() {
        "json" => print_json(&report)?,
        "md" => print_markdown(&report, &args.input),
        "text" => print_terminal(&report, &args.input),
        other => anyhow::bail!("Unknown format: {}. Use 'text', 'md' or 'json'", other),
    }

    Ok(())
}

fn print_terminal(report: &Report, input: &std::path::Path) {
    let title = format!("Clickstream report: {}", input.display());

    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", title);
    println!("╰{}╯", "─".repeat(60));
    println!();

    println!("SUMMARY");
    println!("   Records:        {}", report.records);
    println!(
        "   Plays between home visits (avg): {}",
        average_or_na(report)
    );
    if let Some(cohort) = &report.cohort {
        println!(
            "   Users with {} = {}: {}",
            cohort.field, cohort.value, cohort.users
        );
    }
    println!();

    println!("SONG PLAYS BY HOUR");
    let peak = report
        .hourly_histogram
        .iter()
        .map(|h| h.count)
        .max()
        .unwrap_or(0);
    for bucket in &report.hourly_histogram {
        println!(
            "   {:02}:00  {:<30} {}",
            bucket.hour,
            bar(bucket.count, peak, 30),
            bucket.count
        );
    }
    println!();

    if !report.top_artists.is_empty() {
        println!("TOP ARTISTS");
        for (i, artist) in report.top_artists.iter().enumerate() {
            println!("   {}. {} ({} plays)", i + 1, artist.artist, artist.plays);
        }
        println!();
    }

    println!("DOWNGRADE PHASES");
    println!(
        "   Users: {}   Downgraded: {}",
        report.phases.users, report.phases.users_with_downgrade
    );
    println!(
        "   Events before a downgrade: {}   After the last: {}",
        report.phases.records_before_a_downgrade, report.phases.records_after_last_downgrade
    );
    println!();

    if !report.unvisited_pages.is_empty() {
        println!("PAGES NEVER VISITED ANONYMOUSLY");
        println!("   {}", report.unvisited_pages.join(", "));
        println!();
    }
}

fn print_markdown(report: &Report, input: &std::path::Path) {
    println!("# Clickstream Report");
    println!();
    println!("*Source: `{}`*", input.display());
    println!();

    println!("## Summary");
    println!();
    println!("- **Records:** {}", report.records);
    println!(
        "- **Average plays between home visits:** {}",
        average_or_na(report)
    );
    if let Some(cohort) = &report.cohort {
        println!(
            "- **Users with {} = {}:** {}",
            cohort.field, cohort.value, cohort.users
        );
    }
    println!();

    println!("## Song Plays by Hour");
    println!();
    println!("| Hour | Plays |");
    println!("|------|-------|");
    for bucket in &report.hourly_histogram {
        println!("| {:02}:00 | {} |", bucket.hour, bucket.count);
    }
    println!();

    if !report.top_artists.is_empty() {
        println!("## Top Artists");
        println!();
        println!("| # | Artist | Plays |");
        println!("|---|--------|-------|");
        for (i, artist) in report.top_artists.iter().enumerate() {
            println!("| {} | {} | {} |", i + 1, artist.artist, artist.plays);
        }
        println!();
    }

    println!("## Downgrade Phases");
    println!();
    println!("| Metric | Value |");
    println!("|--------|-------|");
    println!("| Users | {} |", report.phases.users);
    println!("| Users who downgraded | {} |", report.phases.users_with_downgrade);
    println!(
        "| Events before a downgrade | {} |",
        report.phases.records_before_a_downgrade
    );
    println!(
        "| Events after the last downgrade | {} |",
        report.phases.records_after_last_downgrade
    );
    println!();

    if !report.unvisited_pages.is_empty() {
        println!("## Pages Never Visited Anonymously");
        println!();
        for page in &report.unvisited_pages {
            println!("- {}", page);
        }
        println!();
    }

    println!("---");
    println!("*Generated by clickstream-report*");
}

fn print_json(report: &Report) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn average_or_na(report: &Report) -> String {
    report
        .average_events_between_markers
        .map_or_else(|| "n/a".to_string(), |avg| avg.to_string())
}

fn bar(count: i64, peak: i64, width: usize) -> String {
    if peak <= 0 {
        return String::new();
    }
    let filled = ((count as f64 / peak as f64) * width as f64).round() as usize;
    "█".repeat(filled.clamp(1, width))
}
