//! peerdex command line interface
//!
//! Discover what connected peers publish, and publish your own directories
//! for them to discover.

mod config;

use crate::config::AppConfig;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use peerdex_content::{ensure_available, ContentService, IpfsCli};
use peerdex_discovery::{pin_pointer, Catalog, ScanOptions, Scanner};
use peerdex_publish::Publisher;
use peerdex_storage::{SledStorage, Storage};
use peerdex_types::{IndexOutcome, PublishEvent, ScanEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Events buffered between a running job and the terminal.
const EVENT_BUFFER: usize = 64;

#[derive(Parser)]
#[command(name = "peerdex")]
#[command(about = "Discover and publish named content across IPFS peers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Configuration file (defaults to <config dir>/peerdex/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Directory holding the state store
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    /// Log filter, e.g. `info` or `peerdex_discovery=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Path to the ipfs binary
    #[arg(long, global = true, value_name = "PATH")]
    ipfs_bin: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the index of every connected peer and record what they publish
    Scan {
        /// Pin the content behind every resolved pointer
        #[arg(long)]
        pin: bool,
    },
    /// List local keys and discovered pointers
    List {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track a directory and publish it under a naming key
    Add {
        /// Directory to publish
        dir: PathBuf,
        /// Naming key (defaults to the directory name)
        #[arg(long)]
        key: Option<String>,
    },
    /// Re-publish every tracked directory and the discovery index
    Publish,
    /// Pin the content a pointer currently names
    Pin {
        /// Naming pointer to resolve and pin
        pointer: String,
    },
    /// Stop tracking a directory
    Remove {
        /// Tracked directory
        path: PathBuf,
    },
}

impl Commands {
    /// Whether the command talks to ipfs. Only those wait for the daemon.
    fn needs_service(&self) -> bool {
        !matches!(self, Commands::Remove { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.global)?;
    init_logging(&config)?;
    debug!(?config, "configuration loaded");

    let service: Arc<dyn ContentService> = Arc::new(
        IpfsCli::new(&config.ipfs_bin)
            .with_call_timeout(config.call_timeout())
            .with_pin_timeout(config.pin_timeout())
            .with_publish_timeout(config.publish_timeout()),
    );
    if cli.command.needs_service() {
        ensure_available(
            service.as_ref(),
            config.daemon_startup_timeout(),
            config.daemon_poll_interval(),
        )
        .await
        .context("ipfs is not available")?;
    }

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            config.data_dir.display()
        )
    })?;
    let sled = Arc::new(SledStorage::new(config.db_path())?);
    let storage: Arc<dyn Storage> = sled.clone();

    let result = match cli.command {
        Commands::Scan { pin } => handle_scan(service, storage, pin).await,
        Commands::List { json } => handle_list(service, storage, json).await,
        Commands::Add { dir, key } => {
            publisher(service, storage, &config)
                .add_directory(&dir, key.as_deref())
                .await
                .map_err(anyhow::Error::from)
                .map(|outcome| {
                    println!(
                        "Tracking {} as {} -> {}",
                        dir.display(),
                        outcome.key,
                        outcome.pointer_name
                    );
                })
        }
        Commands::Publish => handle_publish(publisher(service, storage, &config)).await,
        Commands::Pin { pointer } => pin_pointer(service.as_ref(), &pointer)
            .await
            .map_err(anyhow::Error::from)
            .map(|content_id| println!("Pinned {pointer} ({content_id})")),
        Commands::Remove { path } => handle_remove(publisher(service, storage, &config), path).await,
    };

    sled.flush()?;
    result
}

fn load_config(args: &GlobalArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(binary) = &args.ipfs_bin {
        config.ipfs_bin = binary.clone();
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Logs share the terminal with command output, so keep them on stderr.
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

fn publisher(
    service: Arc<dyn ContentService>,
    storage: Arc<dyn Storage>,
    config: &AppConfig,
) -> Publisher {
    Publisher::new(service, storage).with_ttl(config.publish_ttl.clone())
}

async fn handle_scan(
    service: Arc<dyn ContentService>,
    storage: Arc<dyn Storage>,
    pin: bool,
) -> Result<()> {
    let scanner = Arc::new(Scanner::new(service, storage, ScanOptions { pin }));
    let (mut events, handle) = scanner.spawn(EVENT_BUFFER);

    let mut total = 0;
    let mut completed = 0;
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Started { total: peers } => {
                total = peers;
                if peers > 0 {
                    println!("Scanning {peers} peers...");
                }
            }
            ScanEvent::Peer(result) => {
                completed += 1;
                println!(
                    "[{completed}/{total}] {} ({} entries, {} resolved)",
                    result.peer_id,
                    result.entries.len(),
                    result.resolved_count()
                );
                for entry in &result.entries {
                    let target = entry.content_id.as_deref().unwrap_or("unresolved");
                    let pinned = if entry.pinned == Some(true) { " [pinned]" } else { "" };
                    println!(
                        "    {} -> {} ({target}){pinned}",
                        entry.display_name, entry.pointer_name
                    );
                }
            }
            ScanEvent::Completed(summary) => {
                if summary.no_peers() {
                    println!("No peers connected.");
                } else {
                    println!(
                        "Scanned {} peers: {} served an index, {} entries recorded.",
                        summary.peers, summary.indexed_peers, summary.entries
                    );
                }
            }
        }
    }

    handle.await??;
    Ok(())
}

async fn handle_list(
    service: Arc<dyn ContentService>,
    storage: Arc<dyn Storage>,
    json: bool,
) -> Result<()> {
    let entries = Catalog::new(service, storage).entries().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("Nothing known yet. Run `peerdex scan` to discover peers.");
        return Ok(());
    }
    for entry in entries {
        let pinned = if entry.pinned { " [pinned]" } else { "" };
        println!(
            "{:<24} {:<20} {}{pinned}",
            entry.source.to_string(),
            entry.display_name,
            entry.pointer_name
        );
    }
    Ok(())
}

async fn handle_publish(publisher: Publisher) -> Result<()> {
    let (mut events, handle) = Arc::new(publisher).spawn(EVENT_BUFFER);

    while let Some(event) = events.recv().await {
        match event {
            PublishEvent::Started { total } => {
                if total > 0 {
                    println!("Publishing {total} directories...");
                }
            }
            PublishEvent::Outcome(outcome) => match (&outcome.content_id, &outcome.error) {
                (_, Some(err)) => println!("  {}: {err}", outcome.key),
                (Some(content_id), None) => println!(
                    "  {} -> {} ({content_id})",
                    outcome.key, outcome.pointer_name
                ),
                (None, None) => println!("  {}: no content id", outcome.key),
            },
            PublishEvent::Index(IndexOutcome::Published {
                node_id,
                content_id,
                keys,
            }) => println!("Index of {keys} keys published at /ipns/{node_id} ({content_id})"),
            PublishEvent::Index(IndexOutcome::Failed(reason)) => {
                println!("Index not published: {reason}")
            }
            PublishEvent::Completed(summary) => {
                if summary.nothing_to_publish() {
                    println!("Nothing to publish. Track a directory with `peerdex add <dir>`.");
                } else {
                    println!(
                        "{} published, {} failed.",
                        summary.published, summary.failed
                    );
                }
            }
        }
    }

    handle.await??;
    Ok(())
}

async fn handle_remove(publisher: Publisher, path: PathBuf) -> Result<()> {
    if publisher.remove(&path).await? {
        println!("Stopped tracking {}", path.display());
    } else {
        println!("{} was not tracked", path.display());
    }
    Ok(())
}
