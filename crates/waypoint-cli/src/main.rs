//! Waypoint CLI - line-oriented chat surface for the two-phase travel coordinator.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use waypoint_core::config::CoordinatorConfig;
use waypoint_core::coordinator::TwoPhaseCoordinator;
use waypoint_core::intent::{IntentExtractor, KeywordIntentExtractor};
use waypoint_core::lookups::InMemoryCatalog;
use waypoint_core::models::{
    AssistantMessage, CoordinatedResponse, CoreError, MessageKind, TurnRecord,
};
use waypoint_core::persistence::TurnStore;
use waypoint_core::sqlite::SqliteStore;
use waypoint_core::telemetry;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Waypoint - travel planning answers in two latency tiers
#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Two-phase travel planning assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read queries from stdin, one per line, and answer each one
    Chat(ChatArgs),

    /// Show recorded turns, newest first
    History {
        /// SQLite database written by `waypoint chat --history`
        #[arg(long)]
        history: PathBuf,

        /// Maximum number of turns to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ChatArgs {
    /// JSON configuration file (millisecond fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database that records every turn
    #[arg(long)]
    history: Option<PathBuf>,

    /// Quick response deadline, overriding config and environment
    #[arg(long)]
    initial_ms: Option<u64>,

    /// Complete response deadline, overriding config and environment
    #[arg(long)]
    complete_ms: Option<u64>,

    /// Artificial latency for the demo lookups
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Emit one JSON object per message instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> CliResult<()> {
    telemetry::init_tracing("warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat(args) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(chat(args))
        }
        Commands::History {
            history,
            limit,
            json,
        } => show_history(&history, limit, json),
    }
}

fn load_config(options: &ChatArgs) -> CliResult<CoordinatorConfig> {
    let mut config = match &options.config {
        Some(path) => CoordinatorConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => CoordinatorConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(ms) = options.initial_ms {
        config.initial_response_time = Duration::from_millis(ms);
    }
    if let Some(ms) = options.complete_ms {
        config.complete_response_time = Duration::from_millis(ms);
    }
    config.validate()?;
    Ok(config)
}

fn open_history(path: &Path) -> CliResult<SqliteStore> {
    let store = SqliteStore::new(path);
    store.migrate_to_latest()?;
    Ok(store)
}

async fn chat(options: ChatArgs) -> CliResult<()> {
    let config = load_config(&options)?;
    let catalog =
        InMemoryCatalog::new().with_latency(Duration::from_millis(options.latency_ms));
    let coordinator = TwoPhaseCoordinator::in_memory(config, Arc::new(catalog))?;
    let extractor = KeywordIntentExtractor::new();
    let store = options.history.as_deref().map(open_history).transpose()?;

    let (mut sender, mut receiver) = mpsc::unbounded_channel::<AssistantMessage>();
    let json = options.json;
    let printer = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            print_message(&message, json);
        }
    });

    if !json {
        eprintln!("Ask about a trip, one question per line (Ctrl-D to quit).");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        let intent = extractor.extract(query);
        let response = coordinator.coordinate(query, &intent, &mut sender).await;

        if let Some(store) = &store
            && let Err(error) = record_turn(store, query, &response)
        {
            tracing::warn!(
                kind = ?error.kind,
                message = %error.message,
                "failed to record conversation turn"
            );
        }
    }

    drop(sender);
    printer.await?;
    Ok(())
}

fn record_turn(
    store: &SqliteStore,
    query: &str,
    response: &CoordinatedResponse,
) -> Result<(), CoreError> {
    let turn = TurnRecord {
        id: store.next_turn_id()?,
        query: query.to_string(),
        quick_response: response.quick_response().to_string(),
        complete_response: response.complete_response().to_string(),
        quick_ms: response.timings.quick.as_millis() as u64,
        complete_ms: response.timings.complete.as_millis() as u64,
        created_at: SystemTime::now(),
    };
    store.record_turn(&turn)
}

fn print_message(message: &AssistantMessage, json: bool) {
    if json {
        match serde_json::to_string(message) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::warn!(%error, "failed to encode message"),
        }
        return;
    }

    let label = match message.kind {
        MessageKind::Acknowledgement => "assistant",
        MessageKind::Quick => "assistant (quick)",
        MessageKind::Complete => "assistant (complete)",
    };
    println!("[{label}]\n{}\n", message.text.trim_end());
}

fn show_history(path: &Path, limit: usize, json: bool) -> CliResult<()> {
    let store = open_history(path)?;
    let turns = store.list_recent_turns(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    if turns.is_empty() {
        println!("No recorded turns.");
        return Ok(());
    }

    for turn in &turns {
        let recorded = turn
            .created_at
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        println!("#{:<5} {recorded}  {}", turn.id.0, turn.query);
        println!(
            "       quick {} ms, complete {} ms",
            turn.quick_ms, turn.complete_ms
        );
    }

    Ok(())
}
