use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use common::{Alert, AlertDraft, AlertSeed, CheckData, Crossover, Error, Result};

use crate::storage::AlertStorage;

/// Result of one alert check, ready to be committed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertUpdate {
    pub alert_id: String,
    /// `None` leaves the previous check data in place.
    pub check_data: Option<CheckData>,
    /// `None` leaves the previous crossover in place.
    pub last_crossover: Option<Crossover>,
    /// Set when the alert fired on the latest date.
    pub triggered_at: Option<DateTime<Utc>>,
}

impl AlertUpdate {
    pub fn apply(&self, alert: &mut Alert) {
        if let Some(check_data) = self.check_data {
            alert.last_check_data = check_data;
        }
        if let Some(crossover) = self.last_crossover {
            alert.last_crossover = Some(crossover);
        }
        if let Some(at) = self.triggered_at {
            alert.last_triggered = Some(at);
        }
    }
}

/// The single owner of the alert collection.
///
/// Every mutation takes the store-wide lock, changes the in-memory list and
/// writes the full collection to storage before releasing the lock. Readers
/// get copies.
pub struct AlertStore {
    alerts: Mutex<Vec<Alert>>,
    storage: Arc<dyn AlertStorage>,
}

impl AlertStore {
    /// Load the persisted collection. Unreadable storage degrades to an empty
    /// store with a warning.
    pub async fn open(storage: Arc<dyn AlertStorage>) -> Self {
        let alerts = match storage.load().await {
            Ok(alerts) => {
                info!(count = alerts.len(), "Alerts loaded");
                alerts
            }
            Err(e) => {
                warn!(error = %e, "Could not load alerts, starting with an empty set");
                Vec::new()
            }
        };
        Self {
            alerts: Mutex::new(alerts),
            storage,
        }
    }

    /// Validate and store a new alert, optionally seeded with precomputed
    /// check data. No market data is fetched here; see
    /// `AlertMonitor::add_alert` for the variant that runs an initial check.
    pub async fn add(&self, draft: AlertDraft, seed: AlertSeed) -> Result<Alert> {
        draft.validate()?;
        let mut alert = draft.into_alert(Utc::now());
        if let Some(check_data) = seed.check_data {
            alert.last_check_data = check_data;
        }
        alert.last_crossover = seed.crossover;
        self.insert(alert).await
    }

    /// Append a fully formed alert and persist.
    pub async fn insert(&self, alert: Alert) -> Result<Alert> {
        let mut alerts = self.alerts.lock().await;
        if alerts.iter().any(|a| a.id == alert.id) {
            return Err(Error::input(format!("alert {} already exists", alert.id)));
        }
        alerts.push(alert.clone());
        if let Err(e) = self.storage.save_all(&alerts).await {
            alerts.pop();
            return Err(e);
        }
        info!(
            alert_id = %alert.id,
            ticker = %alert.ticker,
            short = alert.short_period,
            long = alert.long_period,
            ma_type = %alert.ma_type,
            "Alert added"
        );
        Ok(alert)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut alerts = self.alerts.lock().await;
        let idx = alerts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| Error::AlertNotFound(id.to_string()))?;
        let removed = alerts.remove(idx);
        if let Err(e) = self.storage.save_all(&alerts).await {
            alerts.insert(idx, removed);
            return Err(e);
        }
        info!(alert_id = %id, ticker = %removed.ticker, "Alert deleted");
        Ok(())
    }

    /// Copy of the current collection.
    pub async fn list(&self) -> Vec<Alert> {
        self.alerts.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Alert> {
        self.alerts.lock().await.iter().find(|a| a.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.alerts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.lock().await.is_empty()
    }

    /// Commit a batch of check results under one lock hold and persist once.
    /// Updates for alerts deleted in the meantime are dropped. Returns how
    /// many alerts were updated. If the save fails nothing is changed.
    pub async fn apply_checks(&self, updates: &[AlertUpdate]) -> Result<usize> {
        let mut alerts = self.alerts.lock().await;
        let mut next = alerts.clone();
        let mut applied = 0;
        for update in updates {
            match next.iter_mut().find(|a| a.id == update.alert_id) {
                Some(alert) => {
                    update.apply(alert);
                    applied += 1;
                }
                None => {
                    warn!(alert_id = %update.alert_id, "Alert removed during check, result dropped");
                }
            }
        }
        self.storage.save_all(&next).await?;
        *alerts = next;
        Ok(applied)
    }
}
