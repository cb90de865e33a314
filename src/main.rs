//! Site-Indexer main entry point
//!
//! This is the command-line interface for the Site-Indexer crawl-and-index pipeline.

use anyhow::Context;
use clap::Parser;
use site_indexer::config::{load_config_with_hash, validate, Config};
use site_indexer::crawler::{RunController, RunReport, StopReason};
use site_indexer::output::write_summary;
use site_indexer::url::CrawlScope;
use site_indexer::RunState;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Site-Indexer: a polite crawl-and-index pipeline
///
/// Site-Indexer crawls a site while respecting robots.txt and per-host
/// politeness, extracts the main content of each page, and keeps a vector
/// index of that content up to date.
#[derive(Parser, Debug)]
#[command(name = "site-indexer")]
#[command(version = "1.0.0")]
#[command(about = "A polite crawl-and-index pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors; the final summary is still printed
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Drop and recreate the vector collection before indexing
    #[arg(long)]
    recreate: bool,

    /// Stop after fetching this many pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u64>,

    /// Override the maximum link depth
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_cli_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration after command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            // Only show errors
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("site_indexer=info,warn"),
                1 => EnvFilter::new("site_indexer=debug,info"),
                2 => EnvFilter::new("site_indexer=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if cli.recreate {
        config.vector_store.recreate = true;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(max_depth) = cli.max_depth {
        config.crawler.max_depth = max_depth;
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let scope = CrawlScope::from_config(config)?;

    println!("=== Site-Indexer Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Concurrency: {} ({} per host)", config.crawler.concurrency, config.crawler.per_host_concurrency);
    match config.crawler.max_pages {
        0 => println!("  Max pages: unlimited"),
        n => println!("  Max pages: {}", n),
    }
    match config.crawler.max_duration() {
        Some(limit) => println!("  Max duration: {}s", limit.as_secs()),
        None => println!("  Max duration: unlimited"),
    }

    println!("\nPoliteness:");
    println!(
        "  Delay: {}ms base, {}ms jitter, bounds [{}ms, {}ms]",
        config.politeness.base_delay_ms,
        config.politeness.jitter_ms,
        config.politeness.min_delay_ms,
        config.politeness.max_delay_ms
    );
    println!("  Respect robots.txt: {}", config.politeness.respect_robots);
    println!("  Max retries: {}", config.retry.max_retries);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nIndex:");
    println!("  Embedding endpoint: {}", config.embedding.endpoint);
    println!("  Embedding model: {}", config.embedding.model);
    println!("  Vector store: {}", config.vector_store.url);
    println!("  Collection: {}", config.vector_store.collection);
    if config.vector_store.recreate {
        println!("  ! Collection will be dropped and recreated");
    }
    if let Some(dir) = &config.output.snapshot_dir {
        println!("  Snapshot directory: {}", dir);
    }

    println!("\nAllowed Hosts ({}):", scope.allowed_hosts().len());
    for host in scope.allowed_hosts() {
        println!("  - {}", host);
    }

    println!("\nExclusion Patterns ({}):", config.crawler.exclude_patterns.len());
    for pattern in &config.crawler.exclude_patterns {
        println!("  - {}", pattern);
    }

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.crawler.seeds.len()
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<ExitCode> {
    let controller = RunController::from_config(config).context("failed to build clients")?;

    let stop = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            stop.stop(StopReason::Requested);
        }
    });

    let report = controller.run().await;

    let stdout = std::io::stdout();
    Ok(finish(&report, &mut stdout.lock()))
}

/// Writes the summary for a finished run and maps its state to an exit code
///
/// The summary is written whatever the log level.
fn finish<W: Write>(report: &RunReport, out: &mut W) -> ExitCode {
    if let Err(e) = write_summary(out, &report.summary) {
        tracing::warn!("Failed to print run summary: {}", e);
    }

    if report.state == RunState::Failed {
        tracing::error!(
            "Run failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
