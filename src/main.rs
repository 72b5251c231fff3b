//! Mastodonte main entry point
//!
//! This is the command-line interface for the Mastodonte crawler.

use anyhow::{ensure, Context};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use mastodonte::config::{load_config_with_hash, validate, Config};
use mastodonte::crawler::{load_targets, Coordinator, CrawlOptions, TaskOutcome};
use mastodonte::output::{load_statistics, print_statistics};
use mastodonte::state::{CrawlTarget, ResourceKind};
use mastodonte::storage::open_checkpoint_store;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Mastodonte: a resumable crawler for Mastodon timelines and follow graphs
///
/// Every target is checkpointed after each page, so an interrupted run can
/// be picked up again with --resume.
#[derive(Parser, Debug)]
#[command(name = "mastodonte")]
#[command(version)]
#[command(about = "A resumable crawler for Mastodon timelines and follow graphs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the public timeline of one instance
    Timeline {
        /// Instance host name
        #[arg(long, value_name = "HOST")]
        name: String,

        #[command(flatten)]
        crawl: CrawlArgs,

        #[command(flatten)]
        timeline: TimelineArgs,
    },

    /// Crawl the public timelines of every instance in a list
    Timelines {
        /// File with one instance host per line
        #[arg(long, value_name = "FILE")]
        list_path: PathBuf,

        /// Number of concurrent workers
        #[arg(long, value_name = "K")]
        num_threads: Option<usize>,

        #[command(flatten)]
        crawl: CrawlArgs,

        #[command(flatten)]
        timeline: TimelineArgs,
    },

    /// Crawl the follower or following lists of every user in a list
    Network {
        /// File with one user@host handle per line
        #[arg(long, value_name = "FILE")]
        list_path: PathBuf,

        /// Which list to crawl
        #[arg(long, value_enum)]
        kind: NetworkKind,

        /// Number of concurrent workers
        #[arg(long, value_name = "K")]
        num_threads: Option<usize>,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Crawl the followers of one user
    Followers {
        /// Account handle
        #[arg(long, value_name = "USER@HOST")]
        user: String,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Crawl the accounts one user follows
    Following {
        /// Account handle
        #[arg(long, value_name = "USER@HOST")]
        user: String,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Show checkpoint statistics and exit
    Stats,
}

/// Options shared by every crawl command
#[derive(Args, Debug, Clone)]
struct CrawlArgs {
    /// Maximum pages per target in this run
    #[arg(long, value_name = "N")]
    max_iter: Option<u32>,

    /// Resume from stored checkpoints instead of starting over
    #[arg(long)]
    resume: bool,

    /// Remaining-quota threshold at which to wait for the rate-limit reset
    #[arg(long, value_name = "N")]
    tolerance: Option<u32>,
}

/// Options for timeline crawls
#[derive(Args, Debug, Clone)]
struct TimelineArgs {
    /// Only collect statuses local to the instance
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    local: bool,

    /// Attach the accounts that reblogged each status
    #[arg(long)]
    reblogs: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum NetworkKind {
    Followers,
    Following,
}

impl From<NetworkKind> for ResourceKind {
    fn from(kind: NetworkKind) -> Self {
        match kind {
            NetworkKind::Followers => ResourceKind::Followers,
            NetworkKind::Following => ResourceKind::Following,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Command::Timeline {
            name,
            crawl,
            timeline,
        } => {
            let target = CrawlTarget::timeline(&name)
                .with_context(|| format!("invalid instance '{}'", name))?;
            let options = crawl_options(&config, &crawl, Some(&timeline))?;
            handle_single(config, target, options).await
        }
        Command::Timelines {
            list_path,
            num_threads,
            crawl,
            timeline,
        } => {
            let options = crawl_options(&config, &crawl, Some(&timeline))?;
            handle_many(config, &list_path, ResourceKind::Timeline, num_threads, options).await
        }
        Command::Network {
            list_path,
            kind,
            num_threads,
            crawl,
        } => {
            let options = crawl_options(&config, &crawl, None)?;
            handle_many(config, &list_path, kind.into(), num_threads, options).await
        }
        Command::Followers { user, crawl } => {
            let target = CrawlTarget::followers(&user)
                .with_context(|| format!("invalid account '{}'", user))?;
            let options = crawl_options(&config, &crawl, None)?;
            handle_single(config, target, options).await
        }
        Command::Following { user, crawl } => {
            let target = CrawlTarget::following(&user)
                .with_context(|| format!("invalid account '{}'", user))?;
            let options = crawl_options(&config, &crawl, None)?;
            handle_single(config, target, options).await
        }
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("mastodonte=info,warn"),
            1 => EnvFilter::new("mastodonte=debug,info"),
            2 => EnvFilter::new("mastodonte=trace,debug"),
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

/// Loads the configuration file if one was given, otherwise the defaults
fn load_configuration(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    Ok(config)
}

/// Applies command-line overrides on top of the configuration defaults
fn crawl_options(
    config: &Config,
    crawl: &CrawlArgs,
    timeline: Option<&TimelineArgs>,
) -> anyhow::Result<CrawlOptions> {
    let mut options = CrawlOptions::from_config(config);

    if let Some(max_iter) = crawl.max_iter {
        ensure!(max_iter > 0, "--max-iter must be at least 1");
        options.max_pages = max_iter;
    }
    if let Some(tolerance) = crawl.tolerance {
        options.tolerance = tolerance;
    }
    options.resume = crawl.resume;

    if let Some(timeline) = timeline {
        options.local = timeline.local;
        options.reblogs = timeline.reblogs;
    }

    Ok(options)
}

/// Crawls a single target
async fn handle_single(
    config: Config,
    target: CrawlTarget,
    options: CrawlOptions,
) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;
    let key = target.key();

    match coordinator.crawl_one(target, &options).await {
        TaskOutcome::Completed { items_seen } => {
            println!("✓ {} completed ({} items)", key, items_seen)
        }
        TaskOutcome::AlreadyCompleted => println!("✓ {} was already completed", key),
        TaskOutcome::Suspended { items_seen, cursor } => println!(
            "… {} suspended after the page budget ({} items, cursor {})",
            key,
            items_seen,
            cursor.map(String::from).unwrap_or_else(|| "-".to_string())
        ),
        TaskOutcome::NotFound => println!("✗ {} not found", key),
        TaskOutcome::Failed { reason } => println!("✗ {} failed: {}", key, reason),
    }

    Ok(())
}

/// Crawls every target in a list file across a worker pool
async fn handle_many(
    config: Config,
    list_path: &Path,
    kind: ResourceKind,
    num_threads: Option<usize>,
    options: CrawlOptions,
) -> anyhow::Result<()> {
    let workers = num_threads.unwrap_or(config.crawler.workers);
    ensure!(workers > 0, "--num-threads must be at least 1");

    let targets = load_targets(list_path, kind)
        .with_context(|| format!("failed to read target list {}", list_path.display()))?;
    if targets.is_empty() {
        println!("No targets in {}", list_path.display());
        return Ok(());
    }

    let coordinator = Coordinator::new(config)?;
    let report = coordinator.crawl_many(targets, workers, options).await;

    println!(
        "✓ Crawled {} targets with {} workers in {:.1}s",
        report.targets,
        report.workers,
        report.elapsed.as_secs_f64()
    );

    Ok(())
}

/// Handles the `stats` command: shows statistics from the checkpoint store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("State directory: {}\n", config.output.state_dir);

    let store = open_checkpoint_store(&config.output)?;
    let stats = load_statistics(store.as_ref())?;
    print_statistics(&stats);

    Ok(())
}
