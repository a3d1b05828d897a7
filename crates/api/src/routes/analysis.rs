use axum::{extract::State, routing::post, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{normalize_ticker, Error, MaType, PriceSeries};
use strategy::{optimize, ChartPoint, Optimization};

use crate::{ApiError, AppState};

pub fn analysis_router() -> Router<AppState> {
    Router::new().route("/api/analyze", post(analyze))
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    tickers: Vec<String>,
    #[serde(default)]
    periods: Option<Vec<usize>>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    ma_type: Option<MaType>,
    #[serde(default)]
    confirmation_days: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    ma_type: MaType,
    confirmation_days: usize,
    results: Vec<TickerAnalysis>,
    /// Tickers with no data in the range or whose fetch failed.
    skipped: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TickerAnalysis {
    ticker: String,
    best_pair: BestPair,
    max_gain: f64,
    best_trade_count: usize,
    buy_and_hold_pct: f64,
    optimization_results: Vec<PairRow>,
    chart_data: Vec<ChartPoint>,
}

#[derive(Debug, Serialize)]
struct BestPair {
    short: usize,
    long: usize,
}

#[derive(Debug, Serialize)]
struct PairRow {
    pair: String,
    short: usize,
    long: usize,
    gain: f64,
    trade_count: usize,
}

impl TickerAnalysis {
    fn from_optimization(ticker: String, opt: &Optimization) -> Result<Self, Error> {
        Ok(Self {
            ticker,
            best_pair: BestPair {
                short: opt.best.short,
                long: opt.best.long,
            },
            max_gain: opt.best.total_gain_pct,
            best_trade_count: opt.best.trade_count,
            buy_and_hold_pct: opt.buy_and_hold_pct,
            optimization_results: opt
                .results
                .iter()
                .map(|r| PairRow {
                    pair: r.label(),
                    short: r.short,
                    long: r.long,
                    gain: r.total_gain_pct,
                    trade_count: r.trade_count,
                })
                .collect(),
            chart_data: opt.best_chart()?,
        })
    }
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    if req.start_date > req.end_date {
        return Err(Error::input(format!(
            "start_date {} is after end_date {}",
            req.start_date, req.end_date
        ))
        .into());
    }
    let tickers: Vec<String> = req
        .tickers
        .iter()
        .map(|t| normalize_ticker(t))
        .filter(|t| !t.is_empty())
        .collect();
    if tickers.is_empty() {
        return Err(Error::input("at least one ticker is required").into());
    }

    let periods = req
        .periods
        .unwrap_or_else(|| state.analysis.periods.clone());
    let ma_type = req.ma_type.unwrap_or(state.analysis.ma_type);
    let confirmation_days = req
        .confirmation_days
        .unwrap_or(state.analysis.confirmation_days);

    let mut results = Vec::with_capacity(tickers.len());
    let mut skipped = Vec::new();

    for ticker in tickers {
        let series = match state
            .market
            .fetch_range(&ticker, req.start_date, req.end_date)
            .await
        {
            Ok(series) if !series.is_empty() => series,
            Ok(_) => {
                warn!(ticker = %ticker, "No price data in range, skipping");
                skipped.push(ticker);
                continue;
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Price fetch failed, skipping");
                skipped.push(ticker);
                continue;
            }
        };

        let analysis =
            run_optimization(ticker, series, periods.clone(), ma_type, confirmation_days).await?;
        info!(
            ticker = %analysis.ticker,
            short = analysis.best_pair.short,
            long = analysis.best_pair.long,
            gain_pct = analysis.max_gain,
            "Analysis complete"
        );
        results.push(analysis);
    }

    Ok(Json(AnalyzeResponse {
        ma_type,
        confirmation_days,
        results,
        skipped,
    }))
}

/// The pair sweep is CPU-bound; keep it off the async workers.
async fn run_optimization(
    ticker: String,
    series: PriceSeries,
    periods: Vec<usize>,
    ma_type: MaType,
    confirmation_days: usize,
) -> Result<TickerAnalysis, Error> {
    tokio::task::spawn_blocking(move || {
        let opt = optimize(&series, &periods, ma_type, confirmation_days)?;
        TickerAnalysis::from_optimization(ticker, &opt)
    })
    .await
    .map_err(|e| Error::Other(format!("optimization task failed: {e}")))?
}
