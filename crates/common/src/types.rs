use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Ordered close-price history for a single ticker.
///
/// Dates are strictly increasing and every close is a positive finite number;
/// both are checked on construction. An empty series means "no data".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Result<Self> {
        let ticker = ticker.into();
        for (i, point) in points.iter().enumerate() {
            if !point.close.is_finite() || point.close <= 0.0 {
                return Err(Error::input(format!(
                    "{ticker}: close on {} must be a positive number, got {}",
                    point.date, point.close
                )));
            }
            if i > 0 && points[i - 1].date >= point.date {
                return Err(Error::input(format!(
                    "{ticker}: dates must be strictly increasing ({} then {})",
                    points[i - 1].date, point.date
                )));
            }
        }
        Ok(Self { ticker, points })
    }

    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            points: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Gain in percent from holding the asset over the whole series.
    /// `None` for an empty series.
    pub fn buy_and_hold_pct(&self) -> Option<f64> {
        let first = self.points.first()?.close;
        let last = self.points.last()?.close;
        Some((last - first) / first * 100.0)
    }
}

/// Trims and upper-cases a ticker symbol.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Moving-average flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum MaType {
    #[default]
    #[serde(rename = "EMA", alias = "ema")]
    Ema,
    #[serde(rename = "SMA", alias = "sma")]
    Sma,
}

impl std::fmt::Display for MaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaType::Ema => write!(f, "EMA"),
            MaType::Sma => write!(f, "SMA"),
        }
    }
}

impl std::str::FromStr for MaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "EMA" => Ok(MaType::Ema),
            "SMA" => Ok(MaType::Sma),
            other => Err(Error::input(format!(
                "moving average type must be 'EMA' or 'SMA', got '{other}'"
            ))),
        }
    }
}

/// Identifies one moving-average series: its flavour and window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaKey {
    pub ma_type: MaType,
    pub period: usize,
}

impl MaKey {
    pub fn new(ma_type: MaType, period: usize) -> Self {
        Self { ma_type, period }
    }
}

impl std::fmt::Display for MaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.ma_type, self.period)
    }
}

/// Crossover signal for one date. Serialized as `-1`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Signal {
    /// Short MA crossed below the long MA.
    Sell,
    #[default]
    None,
    /// Short MA crossed above the long MA.
    Buy,
}

impl Signal {
    pub fn value(self) -> i8 {
        match self {
            Signal::Sell => -1,
            Signal::None => 0,
            Signal::Buy => 1,
        }
    }

    pub fn is_crossover(self) -> bool {
        self != Signal::None
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal.value()
    }
}

impl TryFrom<i8> for Signal {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(Signal::Sell),
            0 => Ok(Signal::None),
            1 => Ok(Signal::Buy),
            other => Err(format!("signal must be -1, 0 or 1, got {other}")),
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Sell => write!(f, "Sell"),
            Signal::None => write!(f, "Hold"),
            Signal::Buy => write!(f, "Buy"),
        }
    }
}

/// Direction of the gap between the short and long MA over the last two dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trend {
    Converging,
    Diverging,
    #[default]
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Converging => write!(f, "Converging"),
            Trend::Diverging => write!(f, "Diverging"),
            Trend::NotAvailable => write!(f, "N/A"),
        }
    }
}

/// Snapshot of the MA pair as of the latest check.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckData {
    pub short_val: Option<f64>,
    pub long_val: Option<f64>,
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub estimated_days_to_crossover: Option<u32>,
}

/// The most recent historical crossover found for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossover {
    pub signal: Signal,
    pub date: NaiveDate,
}

/// A persisted (ticker, period pair, MA type) tuple watched for crossovers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub ticker: String,
    #[serde(alias = "short_p")]
    pub short_period: usize,
    #[serde(alias = "long_p")]
    pub long_period: usize,
    #[serde(default)]
    pub ma_type: MaType,
    #[serde(deserialize_with = "lenient_timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize_option")]
    pub last_triggered: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_check_data: CheckData,
    #[serde(default)]
    pub last_crossover: Option<Crossover>,
}

impl Alert {
    pub fn ma_keys(&self) -> (MaKey, MaKey) {
        (
            MaKey::new(self.ma_type, self.short_period),
            MaKey::new(self.ma_type, self.long_period),
        )
    }
}

/// Parameters for a new alert, before it has an id or any state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub ticker: String,
    pub short_period: usize,
    pub long_period: usize,
    #[serde(default)]
    pub ma_type: MaType,
}

impl AlertDraft {
    pub fn new(
        ticker: impl AsRef<str>,
        short_period: usize,
        long_period: usize,
        ma_type: MaType,
    ) -> Self {
        Self {
            ticker: normalize_ticker(ticker.as_ref()),
            short_period,
            long_period,
            ma_type,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticker.is_empty() {
            return Err(Error::input("ticker must not be empty"));
        }
        if self.short_period == 0 {
            return Err(Error::input("periods must be positive integers"));
        }
        if self.short_period >= self.long_period {
            return Err(Error::input(format!(
                "short period ({}) must be less than long period ({})",
                self.short_period, self.long_period
            )));
        }
        Ok(())
    }

    /// Materialises the draft as a fresh alert with a new id and no history.
    pub fn into_alert(self, created_at: DateTime<Utc>) -> Alert {
        Alert {
            id: uuid::Uuid::new_v4().to_string(),
            ticker: self.ticker,
            short_period: self.short_period,
            long_period: self.long_period,
            ma_type: self.ma_type,
            created_at,
            last_triggered: None,
            last_check_data: CheckData::default(),
            last_crossover: None,
        }
    }
}

/// Precomputed state a caller may hand over when adding an alert, so that
/// no fetch is needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSeed {
    #[serde(default)]
    pub check_data: Option<CheckData>,
    #[serde(default)]
    pub crossover: Option<Crossover>,
}

/// Emitted when an alert's pair crosses on the most recent trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub alert_id: String,
    pub ticker: String,
    pub signal: Signal,
    /// Last close of the refreshed series.
    pub price: f64,
    pub date: NaiveDate,
}

/// Alert files written by earlier versions store timestamps without an
/// offset (`2024-03-01T12:00:00.123456`). Those are read as local wall-clock
/// time; anything else must be RFC 3339.
mod lenient_timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        // Skipped local times (DST gaps) fall back to UTC.
        Some(
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map_or_else(|| naive.and_utc(), |at| at.with_timezone(&Utc)),
        )
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn series_rejects_out_of_order_dates() {
        let points = vec![PricePoint::new(day(2), 10.0), PricePoint::new(day(1), 11.0)];
        assert!(matches!(PriceSeries::new("AAPL", points), Err(Error::Input(_))));
    }

    #[test]
    fn series_rejects_non_positive_close() {
        let points = vec![PricePoint::new(day(1), 10.0), PricePoint::new(day(2), 0.0)];
        assert!(PriceSeries::new("AAPL", points).is_err());
    }

    #[test]
    fn buy_and_hold_uses_first_and_last_close() {
        let points = vec![
            PricePoint::new(day(1), 100.0),
            PricePoint::new(day(2), 90.0),
            PricePoint::new(day(3), 125.0),
        ];
        let series = PriceSeries::new("AAPL", points).unwrap();
        assert!((series.buy_and_hold_pct().unwrap() - 25.0).abs() < 1e-9);
        assert!(PriceSeries::empty("AAPL").buy_and_hold_pct().is_none());
    }

    #[test]
    fn draft_normalizes_and_validates() {
        let draft = AlertDraft::new(" msft ", 10, 20, MaType::Sma);
        assert_eq!(draft.ticker, "MSFT");
        assert!(draft.validate().is_ok());

        assert!(AlertDraft::new("MSFT", 20, 20, MaType::Ema).validate().is_err());
        assert!(AlertDraft::new("MSFT", 0, 20, MaType::Ema).validate().is_err());
        assert!(AlertDraft::new("  ", 5, 20, MaType::Ema).validate().is_err());
    }

    #[test]
    fn signal_serializes_as_integer() {
        let crossover = Crossover {
            signal: Signal::Sell,
            date: day(5),
        };
        let json = serde_json::to_value(crossover).unwrap();
        assert_eq!(json["signal"], -1);
        assert_eq!(json["date"], "2024-01-05");
        assert!(serde_json::from_str::<Signal>("2").is_err());
    }

    #[test]
    fn alert_accepts_legacy_field_names() {
        let raw = r#"{
            "id": "abc",
            "ticker": "AAPL",
            "short_p": 10,
            "long_p": 50,
            "ma_type": "SMA",
            "created_at": "2024-03-01T12:00:00Z",
            "last_triggered": null,
            "last_check_data": {"short_val": null, "long_val": null, "trend": "N/A"},
            "last_crossover": {"signal": 1, "date": "2024-02-20"}
        }"#;
        let alert: Alert = serde_json::from_str(raw).unwrap();
        assert_eq!(alert.short_period, 10);
        assert_eq!(alert.long_period, 50);
        assert_eq!(alert.ma_type, MaType::Sma);
        assert_eq!(alert.last_check_data.trend, Trend::NotAvailable);
        assert_eq!(alert.last_crossover.unwrap().signal, Signal::Buy);
    }

    #[test]
    fn alert_reads_timestamps_without_offset_as_local_time() {
        use chrono::{Local, NaiveDateTime, TimeZone};

        let raw = r#"[{
            "id": "7f0c2a9e-7d1b-4c55-9a57-3f1f2b6f0d11",
            "ticker": "AAPL",
            "short_p": 20,
            "long_p": 50,
            "ma_type": "EMA",
            "created_at": "2024-03-01T12:00:00.123456",
            "last_triggered": "2024-03-04T00:00:01.5",
            "last_check_data": {"short_val": 181.23, "long_val": 179.9, "trend": "Converging"},
            "last_crossover": null
        }]"#;
        let alerts: Vec<Alert> = serde_json::from_str(raw).unwrap();
        assert_eq!(alerts.len(), 1);

        let expected = |s: &str| {
            let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").unwrap();
            Local
                .from_local_datetime(&naive)
                .earliest()
                .unwrap()
                .with_timezone(&Utc)
        };
        assert_eq!(alerts[0].created_at, expected("2024-03-01T12:00:00.123456"));
        assert_eq!(alerts[0].last_triggered, Some(expected("2024-03-04T00:00:01.5")));
    }

    #[test]
    fn alert_timestamps_survive_a_save_and_reload() {
        let alert = AlertDraft::new("SPY", 5, 20, MaType::Ema).into_alert(Utc::now());
        let json = serde_json::to_string(&alert).unwrap();
        assert_eq!(serde_json::from_str::<Alert>(&json).unwrap(), alert);
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let raw = r#"{"id": "x", "ticker": "A", "short_period": 1, "long_period": 2,
                      "created_at": "yesterday"}"#;
        assert!(serde_json::from_str::<Alert>(raw).is_err());
    }
}
