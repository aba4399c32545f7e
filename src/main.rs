//! Recipe-Harvest main entry point
//!
//! This is the command-line interface for the Recipe-Harvest recipe site harvester.

use anyhow::Context;
use clap::Parser;
use recipe_harvest::config::{load_config_with_hash, Config};
use recipe_harvest::crawler::harvest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Recipe-Harvest: a quota-bounded recipe site harvester
///
/// Recipe-Harvest walks the categories of a recipe site page by page,
/// extracts every recipe it finds and downloads the recipe's images,
/// writing one JSON record per recipe.
#[derive(Parser, Debug)]
#[command(name = "recipe-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A quota-bounded recipe site harvester", long_about = None)]
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

    /// Validate config and show the resolved quotas without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show record statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Skip recipes already in the database and append to the records file
    #[arg(long)]
    incremental: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.incremental {
        config.output.incremental = true;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recipe_harvest=info,warn"),
            1 => EnvFilter::new("recipe_harvest=debug,info"),
            2 => EnvFilter::new("recipe_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the resolved configuration and quota table
fn handle_dry_run(config: &Config) {
    println!("=== Recipe-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  User agent: {}", config.site.user_agent);

    println!("\nCrawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Max requests per host: {}",
        config.crawler.max_requests_per_host
    );
    println!(
        "  Politeness delay: {}-{}ms",
        config.crawler.delay_min_ms, config.crawler.delay_max_ms
    );
    println!("  Retry budget: {}", config.crawler.retry_budget);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Shutdown timeout: {}s", config.crawler.shutdown_timeout_secs);

    println!("\nOutput:");
    println!("  Records: {}", config.output.records_path);
    println!("  Images: {}", config.output.image_root);
    println!("  Database: {}", config.output.database_path);
    println!("  Incremental: {}", config.output.incremental);

    let quota = &config.quota;
    println!("\nQuotas (listing pages per feed):");
    println!("  {:<24} {:>5}", "category (default)", quota.default);
    println!("  {:<24} {:>5}", "all:hot", quota.hot);
    println!("  {:<24} {:>5}", "all:pop", quota.pop);
    println!("  {:<24} {:>5}", "timeline", quota.timeline);
    if let Some(file) = &quota.quota_file {
        println!("  (overrides from {})", file);
    }

    println!("\nCategory Overrides ({}):", quota.categories.len());
    for (key, pages) in &quota.categories {
        let note = if *pages == 0 { "  (skipped)" } else { "" };
        println!("  {:<24} {:>5}{}", key, pages, note);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows record statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use recipe_harvest::output::{load_statistics, print_statistics};
    use recipe_harvest::storage::SqliteStorage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: &str) -> anyhow::Result<()> {
    if config.output.incremental {
        tracing::info!("Starting incremental harvest (known recipes are skipped)");
    } else {
        tracing::info!("Starting harvest");
    }

    tracing::info!(
        "Default quota: {}, category overrides: {}, hot: {}, pop: {}, timeline: {}",
        config.quota.default,
        config.quota.categories.len(),
        config.quota.hot,
        config.quota.pop,
        config.quota.timeline
    );

    match harvest(config, config_hash).await {
        Ok(summary) => {
            tracing::info!(
                "Harvest run {} finished ({}): {} records",
                summary.run_id,
                summary.status.to_db_string(),
                summary.stats.records_emitted
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
