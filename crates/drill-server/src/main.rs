//! Drill CLI and server
//!
//! `drill serve` runs the study API; the other subcommands inspect and
//! populate the item store directly.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use drill_core::{
    format_interval, normalize_tags, EngineConfig, ItemKind, NewItem, QueueQuery, SessionManager,
};
use drill_server::api::{self, AppState};
use drill_server::{open_engine, DEFAULT_PORT};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// How often finished and idle sessions are swept from memory
const PRUNE_INTERVAL_SECS: u64 = 600;

/// Drill - spaced-repetition study engine
#[derive(Parser)]
#[command(name = "drill")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Spaced-repetition scheduling and study sessions")]
struct Cli {
    /// Custom data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and WebSocket event stream
    Serve {
        /// Port to bind
        #[arg(long, env = "DRILL_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Show queue and accuracy statistics
    Stats,

    /// Preview the items the next session would cover
    Due {
        /// Topic filter (comma-separated)
        #[arg(long)]
        topics: Option<String>,
        /// Maximum items
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Only show due reviews, no new items
        #[arg(long)]
        no_new: bool,
    },

    /// Register a word or question
    Add {
        /// Content: a JSON object, or plain text
        content: String,
        /// Item kind (word, question)
        #[arg(long, default_value = "word")]
        kind: ItemKind,
        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
    },

    /// List registered items with their schedule
    Items {
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::from_env();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }

    match cli.command {
        Commands::Serve {
            port,
            host,
            json_logs,
        } => {
            init_logging(Level::INFO, json_logs);
            run_serve(cli.data_dir, config, SocketAddr::new(host, port))
        }
        command => {
            init_logging(Level::WARN, false);
            let (storage, manager) =
                open_engine(cli.data_dir, &config).context("Failed to open storage")?;
            match command {
                Commands::Stats => run_stats(&manager),
                Commands::Due {
                    topics,
                    limit,
                    no_new,
                } => run_due(&manager, topics, limit, !no_new),
                Commands::Add {
                    content,
                    kind,
                    tags,
                } => run_add(&storage, content, kind, tags),
                Commands::Items { limit, offset } => run_items(&storage, limit, offset),
                Commands::Serve { .. } => Ok(()),
            }
        }
    }
}

/// Logging goes to stderr; `RUST_LOG` overrides the default level
fn init_logging(default_level: Level, json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_serve(data_dir: Option<PathBuf>, config: EngineConfig, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Drill v{} starting...", env!("CARGO_PKG_VERSION"));

    let (storage, manager) = open_engine(data_dir, &config).context("Failed to open storage")?;
    info!("Storage initialized successfully");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        spawn_pruner(
            manager.clone(),
            config.ended_session_retention,
            config.idle_session_timeout,
        );
        let state = AppState::new(manager, storage);
        api::serve(state, addr).await.context("API server error")
    })
}

/// Periodically abandon idle sessions and drop long-finished ones
fn spawn_pruner(
    manager: Arc<SessionManager>,
    retention: chrono::Duration,
    idle_timeout: chrono::Duration,
) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let now = Utc::now();
            let manager = manager.clone();
            let swept = tokio::task::spawn_blocking(move || {
                let abandoned = manager.abandon_idle(now - idle_timeout)?;
                let pruned = manager.prune_ended(now - retention)?;
                Ok::<_, drill_core::SessionError>((abandoned, pruned))
            })
            .await;
            match swept {
                Ok(Ok((0, 0))) => {}
                Ok(Ok((abandoned, pruned))) => info!(abandoned, pruned, "Swept sessions"),
                Ok(Err(e)) => warn!("Session pruning failed: {}", e),
                Err(e) => warn!("Session pruning task failed: {}", e),
            }
        }
    });
}

fn run_stats(manager: &SessionManager) -> anyhow::Result<()> {
    let stats = manager.stats()?;

    println!("{}", "=== Drill Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Total Items".white().bold(), stats.total_items);
    println!("{}: {}", "Due Now".white().bold(), stats.due_count.to_string().yellow());
    println!("{}: {}", "New".white().bold(), stats.new_count.to_string().green());
    println!("{}: {}", "Upcoming".white().bold(), stats.upcoming_count);
    println!();
    println!("{}: {}", "Attempts".white().bold(), stats.total_attempts);
    println!("{}: {}", "Correct".white().bold(), stats.correct_attempts);

    let accuracy = format!("{:.1}%", stats.accuracy * 100.0);
    let accuracy = if stats.total_attempts == 0 {
        accuracy.dimmed()
    } else if stats.accuracy >= 0.8 {
        accuracy.green()
    } else if stats.accuracy >= 0.5 {
        accuracy.yellow()
    } else {
        accuracy.red()
    };
    println!("{}: {}", "Accuracy".white().bold(), accuracy);

    Ok(())
}

fn run_due(
    manager: &SessionManager,
    topics: Option<String>,
    limit: usize,
    include_new: bool,
) -> anyhow::Result<()> {
    let topics = topics
        .as_deref()
        .map(|t| normalize_tags(t.split(',')))
        .unwrap_or_default();
    let selection = manager.preview_queue(&QueueQuery {
        topics,
        limit,
        include_new,
    })?;

    println!("{}", "=== Next Session ===".cyan().bold());
    println!(
        "{} due, {} new",
        selection.due_count.to_string().yellow(),
        selection.new_count.to_string().green()
    );
    println!();

    if selection.items.is_empty() {
        println!("{}", "Nothing to review.".dimmed());
        return Ok(());
    }

    let now = Utc::now();
    for candidate in &selection.items {
        let status = match candidate.state.next_due {
            None => "new".green(),
            Some(due) => {
                let overdue_days = (now - due).num_days();
                format!("overdue {}d", overdue_days).yellow()
            }
        };
        println!(
            "  {} [{}] {} {}",
            candidate.item.id.dimmed(),
            candidate.item.kind,
            preview(&candidate.item.content),
            status
        );
    }

    Ok(())
}

fn run_add(
    storage: &drill_core::Storage,
    content: String,
    kind: ItemKind,
    tags: Option<String>,
) -> anyhow::Result<()> {
    let content = match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(value) if value.is_object() => value,
        _ => match kind {
            ItemKind::Word => serde_json::json!({ "word": content }),
            ItemKind::Question => serde_json::json!({ "question": content }),
        },
    };
    let tags = tags
        .as_deref()
        .map(|t| normalize_tags(t.split(',')))
        .unwrap_or_default();

    let item = storage.add_item(NewItem {
        kind,
        content,
        tags,
    })?;

    println!("{} {} {}", "Added".green().bold(), item.kind, item.id);
    if !item.tags.is_empty() {
        println!("  {}: {}", "Tags".white().bold(), item.tags.join(", "));
    }
    Ok(())
}

fn run_items(storage: &drill_core::Storage, limit: usize, offset: usize) -> anyhow::Result<()> {
    let items = storage.list_items(limit, offset)?;
    let total = storage.count_items()?;

    println!(
        "{} (showing {} of {})",
        "=== Items ===".cyan().bold(),
        items.len(),
        total
    );
    println!();

    for candidate in &items {
        let schedule = match candidate.state.next_due {
            None => "new".green().to_string(),
            Some(due) => format!(
                "every {} (reps {}, ease {:.2}), due {}",
                format_interval(candidate.state.interval_days),
                candidate.state.repetitions,
                candidate.state.ease,
                due.format("%Y-%m-%d")
            ),
        };
        println!(
            "  {} [{}] {} {}",
            candidate.item.id.dimmed(),
            candidate.item.kind,
            preview(&candidate.item.content),
            schedule
        );
    }

    Ok(())
}

/// First string field of the content payload, shortened for terminal output
fn preview(content: &serde_json::Value) -> String {
    let text = ["word", "question", "text", "prompt"]
        .iter()
        .find_map(|key| content.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| content.to_string());

    if text.chars().count() > 60 {
        let short: String = text.chars().take(57).collect();
        format!("{}...", short)
    } else {
        text
    }
}
