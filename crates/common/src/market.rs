use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use crate::{PriceSeries, Result};

/// Abstraction over the historical price feed.
///
/// `YahooClient` in `crates/market` implements this against the public chart
/// API. Tests substitute an in-memory source.
///
/// Both methods may return an empty series (unknown ticker, no trading days
/// in range). Callers treat that as "skip", not as an error.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily closes for `ticker` between `start` and `end` (inclusive).
    async fn fetch_range(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<PriceSeries>;

    /// Daily closes covering the last `lookback` up to today.
    async fn fetch_recent(&self, ticker: &str, lookback: Duration) -> Result<PriceSeries> {
        let end = Utc::now().date_naive();
        self.fetch_range(ticker, end - lookback, end).await
    }
}
