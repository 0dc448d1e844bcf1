//! esgf-status - Which ESGF nodes are up

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use esgf_status_core::{NodeStatus, StatusCache, StatusConfig, StatusProvider};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, SystemTime};

#[derive(Parser)]
#[command(
    name = "esgf-status",
    version,
    about = "Report which ESGF nodes are up",
    long_about = "Scrapes the ESGF node status page (https://aims2.llnl.gov/nodes) with a\n\
                  headless Chrome and caches the result for 10 minutes in\n\
                  ~/.esmvaltool/cache/esgf-nodes-status.json.\n\
                  \n\
                  Examples:\n\
                    esgf-status                          # Show all nodes (default)\n\
                    esgf-status show --available --json  # Available nodes as JSON\n\
                    esgf-status check esgf.ceda.ac.uk    # Exit 1 unless the node is up\n\
                    esgf-status refresh                  # Ignore the cache, scrape now\n\
                    esgf-status cache-info               # Cache file path, age, freshness\n\
                    esgf-status clear-cache              # Delete the cache file\n\
                  \n\
                  Environment Variables:\n\
                    ESGF_STATUS_CACHE_FILE               # Override cache file path\n\
                    ESGF_STATUS_TTL                      # Cache TTL in seconds\n\
                    ESGF_STATUS_URL                      # Status page URL\n\
                    ESGF_STATUS_TIMEOUT                  # Table render timeout in seconds\n\
                    ESGF_STATUS_NAVIGATION_TIMEOUT       # Page load timeout in seconds\n\
                    ESGF_STATUS_CHROME                   # Chrome/Chromium binary\n\
                    ESGF_STATUS_NO_COLOR                 # Disable ANSI colors\n\
                    RUST_LOG                             # Log filter (overrides -v)"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Cache file (default: ~/.esmvaltool/cache/esgf-nodes-status.json)
    #[arg(long, global = true, env = "ESGF_STATUS_CACHE_FILE")]
    cache_file: Option<PathBuf>,

    /// Cache time-to-live in seconds
    #[arg(long, global = true, env = "ESGF_STATUS_TTL", value_name = "SECS")]
    ttl: Option<u64>,

    /// Status page URL
    #[arg(long, global = true, env = "ESGF_STATUS_URL")]
    url: Option<String>,

    /// Seconds to wait for the status table to render
    #[arg(long, global = true, env = "ESGF_STATUS_TIMEOUT", value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds to wait for the page to load and its network to go idle
    #[arg(
        long,
        global = true,
        env = "ESGF_STATUS_NAVIGATION_TIMEOUT",
        value_name = "SECS"
    )]
    navigation_timeout: Option<u64>,

    /// Chrome/Chromium binary (auto-detected by default)
    #[arg(long, global = true, env = "ESGF_STATUS_CHROME")]
    chrome: Option<PathBuf>,

    /// Run Chrome without its sandbox (containers running as root)
    #[arg(long, global = true)]
    no_sandbox: bool,

    /// Disable ANSI colors (ESGF_STATUS_NO_COLOR=1 also works)
    #[arg(
        long,
        global = true,
        env = "ESGF_STATUS_NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    no_color: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Show availability of all nodes (default)
    Show {
        /// Only list available nodes
        #[arg(long)]
        available: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check specific nodes; exits with status 1 unless all are available
    Check {
        /// Node names as listed on the status page
        #[arg(required = true)]
        nodes: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scrape the status page now and rewrite the cache
    Refresh {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show cache file location, age and freshness
    CacheInfo {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the cache file
    ClearCache,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = build_config(&cli)?;
    let no_color = cli.no_color;

    match cli.command.unwrap_or(Command::Show {
        available: false,
        json: false,
    }) {
        Command::Show { available, json } => run_show(&config, available, json, no_color),
        Command::Check { nodes, json } => run_check(&config, &nodes, json),
        Command::Refresh { json } => run_refresh(&config, json, no_color),
        Command::CacheInfo { json } => run_cache_info(&config, json),
        Command::ClearCache => run_clear_cache(&config),
    }
}

/// Defaults from the home directory, overridden by flags / environment
fn build_config(cli: &Cli) -> Result<StatusConfig> {
    let mut config = match &cli.cache_file {
        Some(path) => StatusConfig::new(path),
        None => StatusConfig::from_home().context("Could not determine cache location")?,
    };

    if let Some(ttl) = cli.ttl {
        config = config.with_ttl(Duration::from_secs(ttl));
    }
    if let Some(url) = &cli.url {
        config = config.with_url(url);
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_render_timeout(Duration::from_secs(timeout));
    }
    if let Some(timeout) = cli.navigation_timeout {
        config = config.with_navigation_timeout(Duration::from_secs(timeout));
    }
    if let Some(chrome) = &cli.chrome {
        config = config.with_chrome_path(chrome);
    }
    if cli.no_sandbox {
        config = config.without_sandbox();
    }

    tracing::debug!(
        cache_file = %config.cache_file.display(),
        ttl_secs = config.ttl.as_secs(),
        url = %config.url,
        "Resolved configuration"
    );
    Ok(config)
}

fn run_show(
    config: &StatusConfig,
    available_only: bool,
    json: bool,
    no_color: bool,
) -> Result<ExitCode> {
    let provider = open_provider(config)?;
    let status = cached_or_live(&provider)?;

    println!(
        "{}",
        cli::format_status_table(&status, available_only, json, no_color)
    );
    Ok(ExitCode::SUCCESS)
}

fn run_check(config: &StatusConfig, nodes: &[String], json: bool) -> Result<ExitCode> {
    let provider = open_provider(config)?;
    let status = cached_or_live(&provider)?;

    let (results, all_up) = cli::check_nodes(&status, nodes);
    println!("{}", cli::format_check(&results, json));

    Ok(if all_up {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_refresh(config: &StatusConfig, json: bool, no_color: bool) -> Result<ExitCode> {
    let provider = open_provider(config)?;
    let status = with_spinner(true, "Scraping ESGF node status page...", || {
        provider.refresh()
    })?
    .context("Failed to refresh ESGF node status")?;

    println!("{}", cli::format_status_table(&status, false, json, no_color));
    Ok(ExitCode::SUCCESS)
}

fn run_cache_info(config: &StatusConfig, json: bool) -> Result<ExitCode> {
    let cache = StatusCache::new(&config.cache_file, config.ttl);
    let info = cli::CacheInfo::collect(&cache, SystemTime::now());
    println!("{}", cli::format_cache_info(&info, json));
    Ok(ExitCode::SUCCESS)
}

fn run_clear_cache(config: &StatusConfig) -> Result<ExitCode> {
    let cache = StatusCache::new(&config.cache_file, config.ttl);
    if cache.clear().context("Failed to clear node status cache")? {
        println!("Cleared {}", cache.path().display());
    } else {
        println!("No cache file at {}", cache.path().display());
    }
    Ok(ExitCode::SUCCESS)
}

fn open_provider(config: &StatusConfig) -> Result<StatusProvider> {
    StatusProvider::from_config(config).context("Failed to prepare node status cache")
}

/// Cached status, scraping behind a spinner when the cache is stale
fn cached_or_live(provider: &StatusProvider) -> Result<NodeStatus> {
    let stale = !provider.cache().is_valid();
    with_spinner(stale, "Loading ESGF node status...", || provider.get_status())?
        .context("Failed to get ESGF node status")
}

/// Run `f` behind a stderr spinner when `show` is set (i.e. a scrape is likely)
fn with_spinner<T>(show: bool, message: &'static str, f: impl FnOnce() -> T) -> Result<T> {
    use indicatif::{ProgressBar, ProgressStyle};

    if !show {
        return Ok(f());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message);

    let result = f();
    spinner.finish_and_clear();
    Ok(result)
}
