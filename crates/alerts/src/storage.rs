use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use common::{Alert, Error, Result};

/// Durable backing for the alert collection.
///
/// `save_all` always receives the complete collection; implementations
/// replace whatever they held before.
#[async_trait]
pub trait AlertStorage: Send + Sync {
    /// Read the persisted collection. A store that has never been written
    /// returns an empty list.
    async fn load(&self) -> Result<Vec<Alert>>;

    async fn save_all(&self, alerts: &[Alert]) -> Result<()>;
}

/// Alerts kept as a pretty-printed JSON array in a single file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a reader never sees a half-written file.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "alerts.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl AlertStorage for JsonFileStorage {
    async fn load(&self) -> Result<Vec<Alert>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Alerts file absent");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            Error::Persistence(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    async fn save_all(&self, alerts: &[Alert]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(alerts)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = alerts.len(), "Alerts saved");
        Ok(())
    }
}

/// Keeps the "persisted" collection in memory. Used for tests and for
/// running without a writable disk.
#[derive(Default)]
pub struct MemoryStorage {
    alerts: Mutex<Vec<Alert>>,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alerts(alerts: Vec<Alert>) -> Self {
        Self {
            alerts: Mutex::new(alerts),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of completed `save_all` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The collection as last saved.
    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl AlertStorage for MemoryStorage {
    async fn load(&self) -> Result<Vec<Alert>> {
        Ok(self.snapshot())
    }

    async fn save_all(&self, alerts: &[Alert]) -> Result<()> {
        let mut stored = self
            .alerts
            .lock()
            .map_err(|_| Error::Persistence("memory storage lock poisoned".into()))?;
        *stored = alerts.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use common::{AlertDraft, MaType};

    use super::*;

    fn sample() -> Alert {
        AlertDraft::new("AAPL", 10, 50, MaType::Ema).into_alert(Utc::now())
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("alerts.json"));
        assert!(storage.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        std::fs::write(&path, "{ not json").unwrap();
        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load().await, Err(Error::Persistence(_))));
    }

    #[tokio::test]
    async fn saved_collection_reloads_identically() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested").join("alerts.json"));
        let alerts = vec![sample(), sample()];

        storage.save_all(&alerts).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), alerts);
        assert!(!storage.temp_path().exists());

        storage.save_all(&alerts[..1]).await.unwrap();
        assert_eq!(storage.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_storage_counts_saves() {
        let storage = MemoryStorage::new();
        storage.save_all(&[sample()]).await.unwrap();
        storage.save_all(&[]).await.unwrap();
        assert_eq!(storage.save_count(), 2);
        assert!(storage.load().await.unwrap().is_empty());
    }
}
