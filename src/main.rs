//! alpha-radar command-line entry point.

use alpha_radar::cli::{self, Command};
use alpha_radar::config::{AlertRules, RadarConfig};
use alpha_radar::curation;
use alpha_radar::errors::RadarError;
use alpha_radar::logging::init_tracing;
use alpha_radar::radar::{
    AlertFileSink, AlertSink, JsonFileStateStore, OutputWriter, ScanPipeline, SnapshotLedger,
    SolanaFactGatherer, SqliteSnapshotLedger, TelegramNotifier,
};
use alpha_radar::types::Token;
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let command = match cli::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, cli::USAGE);
            std::process::exit(2);
        }
    };

    init_tracing()?;
    let config = RadarConfig::from_env();

    let outcome = match command {
        Command::Scan => scan(&config).await,
        Command::Send => send(&config).await,
        Command::Analyze { address, chain, symbol } => {
            analyze(&config, Token::new(symbol, chain, address)).await
        }
        Command::Publish => publish(&config).await,
        Command::InitDb => init_db(&config).await,
        Command::History { address, limit } => history(&config, &address, limit).await,
        Command::Help => {
            println!("{}", cli::USAGE);
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}

/// One full scan cycle over the published token list.
async fn scan(config: &RadarConfig) -> Result<()> {
    info!("Starting alpha-radar scan");

    let rules = AlertRules::load(&config.rules_path)?;
    let tokens = curation::load_token_list(&config.token_list_path).await?;
    let mut state = JsonFileStateStore::open(config.state_path()).await?;

    let gatherer = Arc::new(SolanaFactGatherer::from_config(config));
    let mut pipeline = ScanPipeline::new(gatherer, rules).with_config(config);

    if let Some(db_path) = &config.db_path {
        match SqliteSnapshotLedger::connect(db_path).await {
            Ok(ledger) => pipeline = pipeline.with_ledger(Arc::new(ledger)),
            Err(e) => warn!("Snapshot ledger disabled: {:#}", e),
        }
    }

    let sink = AlertFileSink::new(config.alerts_path());
    let report = pipeline.run_cycle(&tokens, &mut state, &sink).await?;

    OutputWriter::new(config.summary_path(), config.latest_dir())
        .write_report(&report)
        .await?;

    info!(
        "Scan finished: {} ok, {} error(s), {} alert(s)",
        report.results.len() - report.error_count(),
        report.error_count(),
        report.alerts.len()
    );
    Ok(())
}

/// Deliver the last alert batch to Telegram.
async fn send(config: &RadarConfig) -> Result<()> {
    let telegram = config.telegram.clone().ok_or_else(|| {
        RadarError::NotifierUnconfigured("set TG_BOT_TOKEN and TG_CHAT_ID".to_string())
    })?;

    let batch = match AlertFileSink::new(config.alerts_path()).read().await? {
        Some(batch) => batch,
        None => {
            info!("No alerts file yet at {}", config.alerts_path().display());
            return Ok(());
        }
    };
    if batch.alerts.is_empty() {
        info!("No alerts to send");
        return Ok(());
    }

    TelegramNotifier::new(Client::new(), telegram)
        .emit(&batch.alerts)
        .await
}

/// Score one token and print its snapshot.
async fn analyze(config: &RadarConfig, token: Token) -> Result<()> {
    let rules = AlertRules::load(&config.rules_path)?;
    let gatherer = Arc::new(SolanaFactGatherer::from_config(config));
    let pipeline = ScanPipeline::new(gatherer, rules).with_config(config);

    let snapshot = pipeline
        .analyze(&token)
        .await
        .with_context(|| format!("Failed to analyze {}", token.address))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn publish(config: &RadarConfig) -> Result<()> {
    curation::publish(&config.private_list_path, &config.token_list_path).await?;
    Ok(())
}

async fn open_ledger(config: &RadarConfig) -> Result<SqliteSnapshotLedger> {
    let db_path = config
        .db_path
        .as_ref()
        .context("DB_PATH must be set to use the snapshot ledger")?;
    SqliteSnapshotLedger::connect(db_path).await
}

async fn init_db(config: &RadarConfig) -> Result<()> {
    let ledger = open_ledger(config).await?;
    info!("Snapshot ledger ready with {} snapshot(s)", ledger.count().await?);
    Ok(())
}

async fn history(config: &RadarConfig, address: &str, limit: u32) -> Result<()> {
    let ledger = open_ledger(config).await?;
    let snapshots = ledger.snapshots_for(address, limit).await?;
    println!("{}", serde_json::to_string_pretty(&snapshots)?);
    Ok(())
}
