//! Sitelingo main entry point
//!
//! This is the command-line interface for the Sitelingo site crawler.

use anyhow::Context;
use clap::Parser;
use sitelingo::config::{load_config_with_hash, validate, Config};
use sitelingo::crawler::run_crawl;
use sitelingo::{CrawlError, CrawlTarget};
use std::fs::OpenOptions;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Sitelingo: a scoped, multilingual site crawler
///
/// Sitelingo crawls one site from a seed URL, stays inside an allow list of
/// URL prefixes, captures every locale a page offers and stores structured
/// records keyed by URL in a JSON file.
#[derive(Parser, Debug)]
#[command(name = "sitelingo")]
#[command(version)]
#[command(about = "A scoped, multilingual site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the crawl scope without crawling
    #[arg(long)]
    dry_run: bool,

    /// Override the page budget
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Override the output file
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Allowed URL prefix; replaces the configured allow list (repeatable)
    #[arg(long = "allow", value_name = "URL")]
    allow: Vec<String>,

    /// Read allowed URL prefixes from stdin, one per line, until a blank line
    #[arg(long)]
    allow_stdin: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| config.output.log_file.as_ref().map(PathBuf::from));
    setup_logging(cli.verbose, cli.quiet, log_file.as_deref())?;

    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    apply_overrides(&mut config, &cli)?;
    validate(&config).context("Invalid configuration after command-line overrides")?;

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// When a log file is given, the same events are appended to it without
/// ANSI colors.
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitelingo=info,warn"),
            1 => EnvFilter::new("sitelingo=debug,info"),
            2 => EnvFilter::new("sitelingo=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Applies command-line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }

    if let Some(output) = &cli.output {
        config.output.path = output.display().to_string();
    }

    let mut allow_list = cli.allow.clone();
    if cli.allow_stdin {
        let stdin = std::io::stdin();
        allow_list.extend(read_allow_list(stdin.lock()).context("Failed to read allow list")?);
    }

    if !allow_list.is_empty() {
        tracing::info!("Using {} allow-list entries from the command line", allow_list.len());
        config.target.allow_list = allow_list;
    }

    Ok(())
}

/// Reads URLs one per line until a blank line or end of input
fn read_allow_list<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    eprintln!("Enter allowed URLs, one per line (blank line to finish):");

    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let entry = line.trim();
        if entry.is_empty() {
            break;
        }
        entries.push(entry.to_string());
    }
    Ok(entries)
}

/// Handles the --dry-run mode: validates config and shows the crawl scope
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let target = CrawlTarget::new(&config.target.seed_url, &config.target.allow_list)
        .context("Invalid crawl target")?;

    println!("=== Sitelingo Dry Run ===\n");

    println!("Target:");
    println!("  Seed: {}", target.base_url());
    println!("  Domain: {}", target.domain());
    if target.is_domain_wide() {
        println!("  Scope: whole domain");
    } else {
        println!("  Scope ({} prefixes):", target.allow_list().len());
        let mut entries: Vec<_> = target.allow_list().iter().collect();
        entries.sort();
        for entry in entries {
            println!("    - {}", entry);
        }
        if !target.admits(target.base_url()) {
            println!("  Note: the seed itself is outside the allow list");
        }
    }

    println!("\nCrawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!(
        "  Delay between pages: {}-{} ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!("  Page timeout: {}s", config.crawler.page_timeout_secs);

    println!("\nLocales:");
    println!("  Default key: {}", config.locales.default_key);
    for locale in &config.locales.supported {
        println!("  - {} -> {}", locale.code, locale.key);
    }

    println!("\nStructuring service:");
    println!("  Model: {}", config.structurer.model);
    println!("  API key variable: {}", config.structurer.api_key_env);

    println!("\nOutput:");
    println!("  Results: {}", config.output.path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Seed: {}, allow list: {} entries, budget: {} pages",
        config.target.seed_url,
        config.target.allow_list.len(),
        config.crawler.max_pages
    );

    let outcome = match run_crawl(config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    outcome.report.print_summary();

    if let Some(error) = outcome.save_error {
        return Err(anyhow::Error::new(CrawlError::Output(error)).context("Results were not saved"));
    }

    Ok(())
}
