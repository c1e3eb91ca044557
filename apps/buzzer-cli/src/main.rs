mod scenario;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Result;
use buzzer_network::{BroadcastDispatcher, EventDispatcher};
use buzzer_ops::{init_tracing, EventJournal};
use buzzer_orchestrator::{spawn_engine, RaceControl};
use buzzer_types::{config::BuzzerConfig, events::EventKind};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use scenario::Scenario;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "buzzer", about = "Multi-device buzzer race arbitration")]
struct Cli {
    /// Config file; falls back to $BUZZER_CONFIG, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play a scripted scenario and print every dispatched event as JSON.
    Run {
        #[arg(long)]
        scenario: PathBuf,
    },
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone());
    init_tracing(&config.ops)?;

    match cli.command {
        Command::CheckConfig => {
            info!("configuration ok: {:?}", config);
            Ok(())
        }
        Command::Run { scenario } => run_scenario(config, Scenario::from_file(scenario)?).await,
    }
}

async fn run_scenario(config: BuzzerConfig, scenario: Scenario) -> Result<()> {
    let dispatcher = Arc::new(BroadcastDispatcher::new(config.network.channel_capacity));
    let journal = EventJournal::new(config.ops.journal_capacity);
    let journal_task = journal.attach(dispatcher.subscribe());

    let mut stream = dispatcher.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!("unable to encode event: {err}"),
            }
        }
    });

    let (handle, engine_task) = spawn_engine(&config, dispatcher.clone())?;
    scenario.play(&handle).await?;

    let status = handle.status().await?;
    let order = handle.query_order().await?;
    let ranking = handle.rate_ranking();
    handle.shutdown().await?;
    engine_task.await?;

    // Closing the last sender ends both subscriber streams.
    drop(handle);
    drop(dispatcher);
    printer.await?;
    journal_task.await?;

    info!("race state at end: {:?}", status.state);
    match &status.winner {
        Some(winner) => info!(
            "winner: {} ({}) button {}",
            winner.device_name, winner.device_address, winner.button_id
        ),
        None => info!("no winner"),
    }
    for entry in &order {
        info!(
            "#{} {} ({}) button {} at {:.6}s",
            entry.rank, entry.device_name, entry.device_address, entry.button_id, entry.timestamp
        );
    }
    for sample in &ranking {
        let rate = if sample.rate_hz.is_infinite() {
            "inf Hz".to_string()
        } else {
            format!("{:.2} Hz", sample.rate_hz)
        };
        info!(
            "[{}] {} ({:.2} ms delay, {} samples)",
            sample.address.short(),
            rate,
            sample.delay_ms,
            sample.samples
        );
    }
    info!(
        "journal: {} events, {} order updates, {} admission errors",
        journal.snapshot_events().await.len(),
        journal.count_kind(EventKind::OrderUpdated).await,
        journal.count_kind(EventKind::AdmissionError).await
    );
    Ok(())
}

fn load_config(from_args: Option<PathBuf>) -> BuzzerConfig {
    let from_env = env::var("BUZZER_CONFIG").ok().map(PathBuf::from);
    let Some(path) = from_args.or(from_env) else {
        return BuzzerConfig::default();
    };
    match BuzzerConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                BuzzerConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            BuzzerConfig::default()
        }
    }
}
