use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;

/// All configuration loaded from environment variables at startup.
/// Every variable is optional; malformed values cause an immediate panic
/// with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // HTTP
    pub port: u16,

    // Alert persistence
    pub alerts_file: PathBuf,

    // Analysis defaults file path (TOML)
    pub analysis_config_path: String,

    // Alert monitor
    /// Local wall-clock time of the daily batch check.
    pub alert_check_time: NaiveTime,
    pub alert_poll_interval: Duration,
    pub alert_check_timeout: Duration,
    /// Minimum history fetched per alert, in calendar days.
    pub alert_lookback_days: i64,

    // Market data
    pub market_data_url: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let alert_check_time = optional_env("ALERT_CHECK_TIME")
            .map(|raw| {
                parse_check_time(&raw).unwrap_or_else(|| {
                    panic!("ALERT_CHECK_TIME must be HH:MM, got: '{raw}'")
                })
            })
            .unwrap_or(NaiveTime::MIN);

        Config {
            port: parsed_env("PORT", 8000),
            alerts_file: alerts_file_from_env(),
            analysis_config_path: optional_env("ANALYSIS_CONFIG_PATH")
                .unwrap_or_else(|| "config/analysis.toml".to_string()),
            alert_check_time,
            alert_poll_interval: Duration::from_secs(parsed_env("ALERT_POLL_SECS", 30)),
            alert_check_timeout: Duration::from_secs(parsed_env("ALERT_CHECK_TIMEOUT_SECS", 30)),
            alert_lookback_days: parsed_env("ALERT_LOOKBACK_DAYS", 365),
            market_data_url: optional_env("MARKET_DATA_URL")
                .unwrap_or_else(|| "https://query1.finance.yahoo.com".to_string()),
        }
    }
}

/// `ALERTS_FILE` wins; otherwise `alerts.json` inside `STORAGE_PATH` /
/// `STORAGE_DIR`; otherwise `./alerts.json`.
fn alerts_file_from_env() -> PathBuf {
    if let Some(file) = optional_env("ALERTS_FILE") {
        return PathBuf::from(file);
    }
    match optional_env("STORAGE_PATH").or_else(|| optional_env("STORAGE_DIR")) {
        Some(dir) => PathBuf::from(dir).join("alerts.json"),
        None => PathBuf::from("alerts.json"),
    }
}

/// Parses `HH:MM` (or `HH:MM:SS`).
pub fn parse_check_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn parsed_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match optional_env(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            panic!("Environment variable '{key}' has an invalid value: '{raw}'")
        }),
        None => default,
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
