use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use alerts::{AlertMonitor, AlertStore, JsonFileStorage, MonitorConfig};
use common::{Config, MarketDataSource};
use market::YahooClient;
use strategy::AnalysisConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        port = cfg.port,
        alerts_file = %cfg.alerts_file.display(),
        check_time = %cfg.alert_check_time,
        "Momentum starting"
    );
    let analysis = Arc::new(AnalysisConfig::load(&cfg.analysis_config_path));

    // ── Market data ───────────────────────────────────────────────────────────
    let market: Arc<dyn MarketDataSource> = Arc::new(
        YahooClient::new(&cfg.market_data_url).context("failed to build market data client")?,
    );

    // ── Alerts ────────────────────────────────────────────────────────────────
    let storage = Arc::new(JsonFileStorage::new(cfg.alerts_file.clone()));
    let store = Arc::new(AlertStore::open(storage).await);
    let monitor = Arc::new(AlertMonitor::new(
        store,
        market.clone(),
        MonitorConfig::from(&cfg),
    ));

    // Surface fired alerts in the log as they happen.
    let mut triggers = monitor.subscribe_triggers();
    tokio::spawn(async move {
        loop {
            match triggers.recv().await {
                Ok(event) => info!(
                    ticker = %event.ticker,
                    signal = %event.signal,
                    price = event.price,
                    date = %event.date,
                    "Crossover alert"
                ),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Trigger log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    monitor.start_scheduler();

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let api_state = api::AppState {
        monitor: monitor.clone(),
        market,
        analysis,
    };
    let port = cfg.port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "HTTP API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received. Exiting.");
    monitor.stop_scheduler();
    Ok(())
}
