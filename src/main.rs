//! Docharvest main entry point
//!
//! This is the command-line interface for the Docharvest documentation harvester.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docharvest::config::{load_config_or_default, Config};
use docharvest::storage::{open_storage, SqliteStorage, Storage};
use docharvest::url::{Scope, UrlFilter};
use docharvest::{Crawler, ProgressEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Docharvest: turn documentation sites into stored Markdown documents
///
/// Docharvest reads a site's sitemap (or follows its links when there is
/// none), renders pages in a headless browser when the site needs it, and
/// saves each page's main content as Markdown.
#[derive(Parser, Debug)]
#[command(name = "docharvest")]
#[command(version)]
#[command(about = "A documentation site harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a documentation project
    Add {
        /// Unique project name
        name: String,
        /// Root URL of the documentation
        url: String,
        /// Include-filter regex (repeatable)
        #[arg(long = "filter", value_name = "REGEX")]
        filters: Vec<String>,
    },

    /// Crawl a project and store its pages
    Crawl {
        /// Project name
        name: String,
        /// Keep previously stored documents instead of replacing them
        #[arg(long)]
        keep_existing: bool,
    },

    /// Print the URLs reachable from a page without storing anything
    Discover {
        /// Start URL
        url: String,
        /// Include-filter regex (repeatable)
        #[arg(long = "filter", value_name = "REGEX")]
        filters: Vec<String>,
    },

    /// List registered projects
    Projects,

    /// List a project's stored documents
    Documents {
        /// Project name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_config_or_default(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Add { name, url, filters } => handle_add(&config, &name, &url, &filters),
        Command::Crawl {
            name,
            keep_existing,
        } => handle_crawl(&config, &name, keep_existing).await,
        Command::Discover { url, filters } => handle_discover(&config, &url, &filters).await,
        Command::Projects => handle_projects(&config),
        Command::Documents { name } => handle_documents(&config, &name),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docharvest=info,warn"),
            1 => EnvFilter::new("docharvest=debug,info"),
            2 => EnvFilter::new("docharvest=trace,debug"),
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

fn open_database(config: &Config) -> Result<SqliteStorage> {
    let path = Path::new(&config.output.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Cancels the returned token on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            token.cancel();
        }
    });
    cancel
}

/// Handles `add`: validates and registers a project
fn handle_add(config: &Config, name: &str, url: &str, filters: &[String]) -> Result<()> {
    Scope::from_source(url)?;
    UrlFilter::from_lines(filters.iter().map(String::as_str))?;

    let storage = open_database(config)?;
    let id = storage.create_project(name, url, &filters.join("\n"))?;

    println!("✓ Added project '{}' (id {}) for {}", name, id, url);
    Ok(())
}

/// Handles `crawl`: runs a full crawl of a registered project
async fn handle_crawl(config: &Config, name: &str, keep_existing: bool) -> Result<()> {
    let storage = Arc::new(open_database(config)?);
    let project = storage.get_project(name)?;

    let crawler = Crawler::from_config(config, storage.clone())?;
    let cancel = cancel_on_interrupt();

    let mut print_progress = |event: ProgressEvent| println!("{}", event);
    let result = if keep_existing {
        crawler
            .crawl_project(&cancel, &project, &mut print_progress)
            .await?
    } else {
        let (result, retired) = crawler
            .recrawl_project(&cancel, &project, storage.as_ref(), &mut print_progress)
            .await?;
        if retired > 0 {
            tracing::info!("Removed {} previously stored documents", retired);
        }
        result
    };

    println!();
    println!("=== Crawl Summary: {} ===", project.name);
    println!("  Saved:  {}", result.saved);
    println!("  Failed: {}", result.failed);
    println!("  Bytes:  {}", result.bytes);
    println!("  Tokens: {}", result.tokens);
    if cancel.is_cancelled() {
        println!("  (interrupted, partial result)");
    }

    Ok(())
}

/// Handles `discover`: prints reachable URLs
async fn handle_discover(config: &Config, url: &str, filters: &[String]) -> Result<()> {
    let filter = UrlFilter::from_lines(filters.iter().map(String::as_str))?;

    // Discovery never writes, an in-memory store is enough
    let storage = Arc::new(SqliteStorage::new_in_memory()?);
    let crawler = Crawler::from_config(config, storage)?;
    let cancel = cancel_on_interrupt();

    let urls = crawler.discover_urls(&cancel, url, &filter).await?;
    for url in &urls {
        println!("{}", url);
    }
    tracing::info!("Discovered {} URLs", urls.len());

    Ok(())
}

/// Handles `projects`: lists projects with document counts
fn handle_projects(config: &Config) -> Result<()> {
    let storage = open_database(config)?;
    let projects = storage.list_projects()?;

    if projects.is_empty() {
        println!("No projects registered");
        return Ok(());
    }

    for project in projects {
        let count = storage.count_documents(project.id)?;
        println!(
            "{:<24} {:>6} docs  {}",
            project.name, count, project.source_url
        );
        for pattern in project.filter_patterns.lines().filter(|l| !l.trim().is_empty()) {
            println!("{:<24} filter: {}", "", pattern);
        }
    }

    Ok(())
}

/// Handles `documents`: lists a project's stored documents
fn handle_documents(config: &Config, name: &str) -> Result<()> {
    let storage = open_database(config)?;
    let project = storage.get_project(name)?;

    for document in storage.list_documents(project.id)? {
        println!(
            "{:>4}  {}  {}  {}",
            document.position, document.content_hash, document.title, document.source_url
        );
    }

    Ok(())
}
