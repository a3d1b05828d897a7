use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use common::{
    Alert, AlertDraft, AlertSeed, CheckData, Config, Crossover, Error, MarketDataSource,
    PriceSeries, Result, TriggerEvent,
};
use strategy::indicators::lookup;
use strategy::{classify_trend, compute_moving_averages, detect_crossovers};

use crate::schedule::{Clock, DailySchedule, LocalClock};
use crate::store::{AlertStore, AlertUpdate};

/// Crossovers seen by alerts use the raw signal, same as a backtest run with
/// no confirmation window.
const ALERT_CONFIRMATION_DAYS: usize = 0;

/// Calendar days of history fetched beyond twice the long period.
const LOOKBACK_MARGIN_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub schedule: DailySchedule,
    /// How often the scheduler wakes to compare the clock with the next run.
    pub poll_interval: Duration,
    /// Upper bound on fetching and evaluating a single alert.
    pub check_timeout: Duration,
    /// Minimum calendar days of history fetched per alert.
    pub lookback_days: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            schedule: DailySchedule::default(),
            poll_interval: Duration::from_secs(30),
            check_timeout: Duration::from_secs(30),
            lookback_days: 365,
        }
    }
}

impl From<&Config> for MonitorConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            schedule: DailySchedule::new(cfg.alert_check_time),
            poll_interval: cfg.alert_poll_interval,
            check_timeout: cfg.alert_check_timeout,
            lookback_days: cfg.alert_lookback_days,
        }
    }
}

/// What a single alert check found.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check_data: Option<CheckData>,
    pub last_crossover: Option<Crossover>,
    /// Present when the pair crossed on the most recent date.
    pub trigger: Option<TriggerEvent>,
}

impl CheckOutcome {
    pub fn to_update(&self, alert_id: &str, checked_at: DateTime<Utc>) -> AlertUpdate {
        AlertUpdate {
            alert_id: alert_id.to_string(),
            check_data: self.check_data,
            last_crossover: self.last_crossover,
            triggered_at: self.trigger.as_ref().map(|_| checked_at),
        }
    }
}

/// Evaluate one alert against a freshly fetched series.
pub fn evaluate(alert: &Alert, series: &PriceSeries) -> Result<CheckOutcome> {
    if series.is_empty() {
        return Err(Error::data_unavailable(&alert.ticker));
    }
    if series.len() < alert.long_period {
        return Err(Error::input(format!(
            "{}: {} closes is not enough history for a {}-period average",
            alert.ticker,
            series.len(),
            alert.long_period
        )));
    }

    let averages = compute_moving_averages(
        series,
        &[alert.short_period, alert.long_period],
        alert.ma_type,
    )?;
    let (short_key, long_key) = alert.ma_keys();
    let short_ma = lookup(&averages, short_key)?;
    let long_ma = lookup(&averages, long_key)?;

    let check_data = (series.len() >= 2)
        .then(|| classify_trend(short_ma, long_ma))
        .transpose()?;

    let signals = detect_crossovers(short_ma, long_ma, ALERT_CONFIRMATION_DAYS)?;
    let latest = signals.latest();
    let trigger = match series.last() {
        Some(last) if latest.is_crossover() => Some(TriggerEvent {
            alert_id: alert.id.clone(),
            ticker: alert.ticker.clone(),
            signal: latest,
            price: last.close,
            date: last.date,
        }),
        _ => None,
    };

    Ok(CheckOutcome {
        check_data,
        last_crossover: signals.last_crossover(),
        trigger,
    })
}

/// Keeps every stored alert's live state current.
///
/// Runs a batch check once a day from a background task and on demand via
/// `check_all_now`. Fetching and evaluation happen outside the store lock;
/// only the final commit takes it.
pub struct AlertMonitor {
    store: Arc<AlertStore>,
    market: Arc<dyn MarketDataSource>,
    config: MonitorConfig,
    trigger_tx: broadcast::Sender<TriggerEvent>,
    clock: Arc<dyn Clock>,
    stop: AtomicBool,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl AlertMonitor {
    pub fn new(
        store: Arc<AlertStore>,
        market: Arc<dyn MarketDataSource>,
        config: MonitorConfig,
    ) -> Self {
        let (trigger_tx, _) = broadcast::channel(256);
        Self {
            store,
            market,
            config,
            trigger_tx,
            clock: Arc::new(LocalClock),
            stop: AtomicBool::new(false),
            scheduler: Mutex::new(None),
        }
    }

    /// Replace the wall clock the scheduler reads.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<AlertStore> {
        &self.store
    }

    /// Subscribe to alerts firing during batch checks.
    pub fn subscribe_triggers(&self) -> broadcast::Receiver<TriggerEvent> {
        self.trigger_tx.subscribe()
    }

    /// Add an alert. Without a seed the alert is checked immediately so it
    /// starts with live data; a failed initial check still stores the alert.
    pub async fn add_alert(&self, draft: AlertDraft, seed: Option<AlertSeed>) -> Result<Alert> {
        if let Some(seed) = seed {
            return self.store.add(draft, seed).await;
        }

        draft.validate()?;
        let mut alert = draft.into_alert(Utc::now());
        match self.check_bounded(&alert).await {
            Ok(outcome) => outcome.to_update(&alert.id, Utc::now()).apply(&mut alert),
            Err(e) => warn!(
                ticker = %alert.ticker,
                error = %e,
                "Initial alert check failed, storing without live data"
            ),
        }
        self.store.insert(alert).await
    }

    pub async fn delete_alert(&self, id: &str) -> Result<()> {
        self.store.delete(id).await
    }

    pub async fn list_alerts(&self) -> Vec<Alert> {
        self.store.list().await
    }

    /// Fetch recent history for one alert and evaluate it.
    pub async fn check_alert(&self, alert: &Alert) -> Result<CheckOutcome> {
        let lookback_days = self
            .config
            .lookback_days
            .max(2 * alert.long_period as i64 + LOOKBACK_MARGIN_DAYS);
        let series = self
            .market
            .fetch_recent(&alert.ticker, chrono::Duration::days(lookback_days))
            .await?;
        evaluate(alert, &series)
    }

    async fn check_bounded(&self, alert: &Alert) -> Result<CheckOutcome> {
        tokio::time::timeout(self.config.check_timeout, self.check_alert(alert))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "check of {} exceeded {:?}",
                    alert.ticker, self.config.check_timeout
                ))
            })?
    }

    /// Check every alert now and return those that fired on the latest date.
    /// A failing alert is logged and keeps its previous state.
    pub async fn check_all_now(&self) -> Vec<TriggerEvent> {
        let alerts = self.store.list().await;
        info!(count = alerts.len(), "Checking alerts");

        let mut updates = Vec::with_capacity(alerts.len());
        let mut triggered = Vec::new();

        for alert in &alerts {
            match self.check_bounded(alert).await {
                Ok(outcome) => {
                    updates.push(outcome.to_update(&alert.id, Utc::now()));
                    if let Some(event) = outcome.trigger {
                        info!(
                            ticker = %event.ticker,
                            signal = %event.signal,
                            price = event.price,
                            date = %event.date,
                            "Alert triggered"
                        );
                        if self.trigger_tx.send(event.clone()).is_err() {
                            debug!(ticker = %event.ticker, "No trigger subscribers");
                        }
                        triggered.push(event);
                    }
                }
                Err(e) => {
                    warn!(
                        alert_id = %alert.id,
                        ticker = %alert.ticker,
                        error = %e,
                        "Alert check failed, keeping previous state"
                    );
                }
            }
        }

        if let Err(e) = self.store.apply_checks(&updates).await {
            error!(error = %e, "Failed to persist alert check results");
        }
        info!(
            checked = updates.len(),
            failed = alerts.len() - updates.len(),
            triggered = triggered.len(),
            "Alert check finished"
        );
        triggered
    }

    /// Spawn the daily scheduler. Returns `false` without spawning if one is
    /// already running. A loop that was asked to stop but has not woken up
    /// yet is aborted and replaced.
    pub fn start_scheduler(self: &Arc<Self>) -> bool {
        let mut slot = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref().filter(|h| !h.is_finished()) {
            if !self.stop.load(Ordering::SeqCst) {
                info!("Alert scheduler already running");
                return false;
            }
            info!("Replacing stopping alert scheduler");
            handle.abort();
        }
        self.stop.store(false, Ordering::SeqCst);
        *slot = Some(tokio::spawn(Arc::clone(self).run_scheduler()));
        true
    }

    /// Ask the scheduler to exit. It notices on its next wake.
    pub fn stop_scheduler(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    async fn run_scheduler(self: Arc<Self>) {
        let schedule = self.config.schedule;
        let mut next_run = schedule.next_after(self.clock.now());
        info!(next_run = %next_run, "Alert scheduler started");

        while !self.stop.load(Ordering::SeqCst) {
            let now = self.clock.now();
            if now >= next_run {
                self.check_all_now().await;
                next_run = schedule.next_after(self.clock.now());
                info!(next_run = %next_run, "Next alert check scheduled");
                continue;
            }
            let until_next = (next_run - now).to_std().unwrap_or_default();
            tokio::time::sleep(until_next.min(self.config.poll_interval)).await;
        }
        info!("Alert scheduler stopped");
    }
}
