use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use common::{Error, MarketDataSource, PricePoint, PriceSeries, Result};

// The chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) momentum-signal/0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Daily closes from the Yahoo Finance chart API.
pub struct YahooClient {
    base_url: Url,
    http: Client,
}

impl YahooClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid market data URL '{base_url}': {e}")))?;
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { base_url, http })
    }

    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);

        // period2 is exclusive, so ask up to the start of the following day.
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = end
            .checked_add_days(Days::new(1))
            .unwrap_or(end)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "history");
        Ok(url)
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn fetch_range(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        if start > end {
            return Err(Error::input(format!(
                "start date {start} is after end date {end}"
            )));
        }
        let url = self.chart_url(ticker, start, end)?;
        debug!(ticker, %start, %end, "Fetching daily closes");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            debug!(ticker, "Unknown ticker");
            return Ok(PriceSeries::empty(ticker));
        }
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }

        let series = parse_chart_response(ticker, &body)?;
        let points: Vec<PricePoint> = series
            .points()
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect();
        debug!(ticker, points = points.len(), "Daily closes received");
        PriceSeries::new(ticker, points)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default, rename = "gmtoffset")]
    gmt_offset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Option<Vec<Option<f64>>>,
}

/// Turn a chart API body into a daily series.
///
/// Bars are dated in the exchange's local time. Null closes are dropped and a
/// later bar for the same date replaces an earlier one. An API-level error or
/// a result without bars yields an empty series.
pub fn parse_chart_response(ticker: &str, body: &str) -> Result<PriceSeries> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        debug!(
            ticker,
            code = %err.code,
            description = err.description.as_deref().unwrap_or(""),
            "Chart API returned an error"
        );
        return Ok(PriceSeries::empty(ticker));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceSeries::empty(ticker));
    };
    let Some(timestamps) = result.timestamp else {
        return Ok(PriceSeries::empty(ticker));
    };
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .and_then(|q| q.close)
        .ok_or_else(|| Error::input(format!("{ticker}: chart response has no close prices")))?;
    if closes.len() != timestamps.len() {
        return Err(Error::input(format!(
            "{ticker}: {} timestamps but {} closes",
            timestamps.len(),
            closes.len()
        )));
    }

    let offset = result.meta.map_or(0, |m| m.gmt_offset);
    let mut by_date = BTreeMap::new();
    for (ts, close) in timestamps.into_iter().zip(closes) {
        let Some(close) = close.filter(|c| c.is_finite() && *c > 0.0) else {
            continue;
        };
        if let Some(at) = DateTime::from_timestamp(ts + offset, 0) {
            by_date.insert(at.date_naive(), close);
        }
    }

    let points = by_date
        .into_iter()
        .map(|(date, close)| PricePoint::new(date, close))
        .collect();
    PriceSeries::new(ticker, points)
}
