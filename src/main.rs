//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest directory and
//! site harvester.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sumi_harvest::checkpoint::load_entries;
use sumi_harvest::config::{load_config_with_hash, Config, StageFiles};
use sumi_harvest::crawler::{DirectoryHarvest, RunContext, RunOptions, RunReport, SiteCrawl};
use sumi_harvest::output::{print_summary, write_jsonl, write_records};
use sumi_harvest::robots::check_seeds;
use sumi_harvest::sources::{extract_seeds, write_seed_csv};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a resumable, polite directory and site harvester
///
/// Sumi-Harvest fetches a paginated directory and every record's details
/// page, then crawls a bounded number of pages of each record's website.
/// Completed work is checkpointed so interrupted runs resume where they
/// stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, polite directory and site harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Start fresh, ignoring the existing checkpoint
    #[arg(long, global = true)]
    fresh: bool,

    /// Fetch again the items whose previous attempt failed
    #[arg(long, conflicts_with = "fresh", global = true)]
    retry_failed: bool,

    /// Validate config and show what would be fetched without fetching
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest listing pages and details pages of the configured directory
    Directory,

    /// Crawl every seed site from the configured seed file
    Sites,

    /// Build the seed file from a directory JSONL output
    ExtractSeeds {
        /// Directory JSONL to read (defaults to directory.jsonl-path)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Seed CSV to write (defaults to sites.seed-file)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Report robots.txt rules for every seed site
    Robots {
        /// Report JSONL to write
        #[arg(long, default_value = "robots_report.jsonl")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        return handle_dry_run(&config, &cli.command);
    }

    let options = RunOptions {
        fresh: cli.fresh,
        retry_failed: cli.retry_failed,
    };

    match cli.command {
        Command::ExtractSeeds { input, output } => handle_extract_seeds(&config, input, output),
        Command::Directory => {
            let ctx = run_context(config)?;
            let report = DirectoryHarvest::new(ctx.clone()).run(options).await?;
            finish_run(&ctx, report)
        }
        Command::Sites => {
            let ctx = run_context(config)?;
            let report = SiteCrawl::new(ctx.clone()).run(options).await?;
            finish_run(&ctx, report)
        }
        Command::Robots { output } => {
            let ctx = run_context(config)?;
            let seeds = SiteCrawl::new(ctx.clone()).seeds()?;
            let reports = check_seeds(&ctx, &seeds).await;
            write_jsonl(&output, &reports)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Robots report written to: {}", output.display());
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
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

/// Builds the run context and cancels it on Ctrl-C
fn run_context(config: Config) -> anyhow::Result<RunContext> {
    let cancel = CancellationToken::new();
    let ctx = RunContext::new(config)
        .context("failed to build HTTP client")?
        .with_cancel(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing the current item and saving the checkpoint");
            cancel.cancel();
        }
    });

    Ok(ctx)
}

/// Writes the run's records and prints its summary
fn finish_run(ctx: &RunContext, report: RunReport) -> anyhow::Result<()> {
    let files = &report.files;
    write_records(files, &ctx.config.output.common_columns, &report.records)
        .context("failed to write output")?;

    print_summary(&report.summary);
    println!("\nFiles saved:");
    println!("  - {}", files.jsonl.display());
    println!("  - {}", files.csv.display());
    println!("  - {}", files.checkpoint.display());

    if report.interrupted {
        println!("\nRun interrupted; run the same command again to resume.");
    }
    Ok(())
}

/// Converts a directory JSONL file into the seed CSV
fn handle_extract_seeds(
    config: &Config,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let input = match (input, &config.directory) {
        (Some(path), _) => path,
        (None, Some(directory)) => PathBuf::from(&directory.jsonl_path),
        (None, None) => bail!("no --input given and no [directory] section configured"),
    };
    let output = match (output, &config.sites) {
        (Some(path), _) => path,
        (None, Some(sites)) => PathBuf::from(&sites.seed_file),
        (None, None) => bail!("no --output given and no [sites] seed-file configured"),
    };

    let extraction = extract_seeds(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    write_seed_csv(&output, &extraction.seeds)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Extraction complete!");
    println!("  Records read: {}", extraction.lines);
    println!("  Unique sites: {}", extraction.seeds.len());
    println!("  Without website: {}", extraction.without_website);
    println!("  Duplicate domains skipped: {}", extraction.duplicate_domains);
    println!("  Malformed lines skipped: {}", extraction.malformed);
    println!("  Output saved to: {}", output.display());
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be fetched
fn handle_dry_run(config: &Config, command: &Command) -> anyhow::Result<()> {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Fetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!("  Backoff base: {}ms", config.fetch.backoff_base_ms);
    println!("  Block markers: {}", config.fetch.block_markers.len());

    println!("\nPacing:");
    println!("  Request delay: {}ms", config.pacing.request_delay_ms);
    println!("  Listing page delay: {}ms", config.pacing.list_page_delay_ms);
    println!("  Site delay: {}ms", config.pacing.site_delay_ms);
    println!("  Max requests/sec: {}", config.pacing.max_requests_per_second);

    match command {
        Command::Directory => {
            let Some(directory) = &config.directory else {
                bail!("the [directory] section is required");
            };
            print_stage_files(&directory.files(), config.checkpoint.flush_interval);
            println!("\nListing pages ({}):", directory.pages.len());
            for &page in &directory.pages {
                println!("  - {}", directory.list_page_url(page));
            }
        }
        Command::Sites | Command::Robots { .. } => {
            if let Some(sites) = &config.sites {
                print_stage_files(&sites.files(), config.checkpoint.flush_interval);
            }
            let ctx = RunContext::new(config.clone()).context("failed to build HTTP client")?;
            let seeds = SiteCrawl::new(ctx).seeds()?;
            println!(
                "\nSeed sites ({}), up to {} pages each, {} worker(s):",
                seeds.len(),
                config.crawl.max_pages_per_site,
                config.crawl.workers
            );
            for seed in &seeds {
                println!("  - {} {}", seed.id, seed.url);
            }
        }
        Command::ExtractSeeds { input, .. } => {
            let input = input
                .clone()
                .or_else(|| config.directory.as_ref().map(|d| PathBuf::from(&d.jsonl_path)));
            match input {
                Some(input) => println!("\nWould extract seeds from: {}", input.display()),
                None => bail!("no --input given and no [directory] section configured"),
            }
        }
    }
    Ok(())
}

/// Prints one stage's checkpoint state and output paths
fn print_stage_files(files: &StageFiles, flush_interval: usize) {
    let entries = load_entries::<serde_json::Value>(&files.checkpoint)
        .map(|e| e.len())
        .unwrap_or(0);
    println!("\nCheckpoint:");
    println!("  Path: {}", files.checkpoint.display());
    println!("  Existing entries: {}", entries);
    println!("  Flush interval: {}", flush_interval);

    println!("\nOutput:");
    println!("  JSONL: {}", files.jsonl.display());
    println!("  CSV: {}", files.csv.display());
}
