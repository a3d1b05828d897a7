use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use common::{Error, MaKey, MaType, PricePoint, PriceSeries, Result};

use crate::backtest::simulate;
use crate::crossover::detect_crossovers;
use crate::indicators::{compute_moving_averages, lookup, MaSet};

/// Backtest outcome for one (short, long) period pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairResult {
    pub short: usize,
    pub long: usize,
    pub total_gain_pct: f64,
    pub trade_count: usize,
}

impl PairResult {
    /// `"short/long"`, e.g. `"5/20"`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.short, self.long)
    }
}

/// One chart row: close plus the two averages of a pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
}

/// Result of sweeping every period pair over one series.
#[derive(Debug, Clone)]
pub struct Optimization {
    pub ma_type: MaType,
    pub confirmation_days: usize,
    /// Highest-gain pair; ties go to the pair enumerated first.
    pub best: PairResult,
    pub buy_and_hold_pct: f64,
    /// Every pair in ascending (short, long) order.
    pub results: Vec<PairResult>,
    pub points: Vec<PricePoint>,
    pub averages: MaSet,
}

impl Optimization {
    pub fn best_pair(&self) -> (usize, usize) {
        (self.best.short, self.best.long)
    }

    /// Close and both averages of `(short, long)` on every date.
    pub fn chart(&self, short: usize, long: usize) -> Result<Vec<ChartPoint>> {
        let short_ma = lookup(&self.averages, MaKey::new(self.ma_type, short))?;
        let long_ma = lookup(&self.averages, MaKey::new(self.ma_type, long))?;
        Ok(self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| ChartPoint {
                date: p.date,
                close: p.close,
                short_ma: short_ma.get(i),
                long_ma: long_ma.get(i),
            })
            .collect())
    }

    pub fn best_chart(&self) -> Result<Vec<ChartPoint>> {
        self.chart(self.best.short, self.best.long)
    }
}

/// Backtests every pair `a < b` drawn from `periods` and picks the one with
/// the largest total gain.
///
/// Averages are computed once for all periods. Pairs are enumerated in
/// ascending (short, long) order and a later pair only wins on a strictly
/// higher gain, so the outcome is deterministic.
pub fn optimize(
    series: &PriceSeries,
    periods: &[usize],
    ma_type: MaType,
    confirmation_days: usize,
) -> Result<Optimization> {
    let mut sorted = periods.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() < 2 {
        return Err(Error::input(
            "at least two distinct moving average periods are required for crossover analysis",
        ));
    }

    let averages = compute_moving_averages(series, &sorted, ma_type)?;

    let mut results = Vec::with_capacity(sorted.len() * (sorted.len() - 1) / 2);
    let mut best: Option<PairResult> = None;

    for (i, &short) in sorted.iter().enumerate() {
        for &long in &sorted[i + 1..] {
            let short_ma = lookup(&averages, MaKey::new(ma_type, short))?;
            let long_ma = lookup(&averages, MaKey::new(ma_type, long))?;
            let signals = detect_crossovers(short_ma, long_ma, confirmation_days)?;
            let backtest = simulate(series, &signals)?;

            let result = PairResult {
                short,
                long,
                total_gain_pct: backtest.total_gain_pct,
                trade_count: backtest.trade_count(),
            };
            debug!(
                ticker = %series.ticker(),
                pair = %result.label(),
                gain_pct = result.total_gain_pct,
                trades = result.trade_count,
                "Pair evaluated"
            );

            if best
                .as_ref()
                .map_or(true, |b| result.total_gain_pct > b.total_gain_pct)
            {
                best = Some(result.clone());
            }
            results.push(result);
        }
    }

    let best = best.ok_or_else(|| Error::Other("no period pair was evaluated".into()))?;

    Ok(Optimization {
        ma_type,
        confirmation_days,
        best,
        buy_and_hold_pct: series.buy_and_hold_pct().unwrap_or(0.0),
        results,
        points: series.points().to_vec(),
        averages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::series_from;

    fn wavy(n: usize) -> PriceSeries {
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + 10.0 * (i as f64 / 6.0).sin() + i as f64 * 0.2)
            .collect();
        series_from(&closes)
    }

    #[test]
    fn three_periods_give_three_pairs_in_order() {
        let opt = optimize(&wavy(120), &[20, 5, 10], MaType::Ema, 0).unwrap();
        let pairs: Vec<(usize, usize)> = opt.results.iter().map(|r| (r.short, r.long)).collect();
        assert_eq!(pairs, vec![(5, 10), (5, 20), (10, 20)]);
        for r in &opt.results {
            assert!(opt.best.total_gain_pct >= r.total_gain_pct);
        }
    }

    #[test]
    fn ties_keep_first_pair() {
        // Flat prices never cross, every pair gains 0.
        let opt = optimize(&series_from(&[50.0; 40]), &[3, 5, 8], MaType::Sma, 0).unwrap();
        assert_eq!(opt.best_pair(), (3, 5));
        assert_eq!(opt.best.total_gain_pct, 0.0);
        assert_eq!(opt.best.trade_count, 0);
    }

    #[test]
    fn fewer_than_two_periods_is_an_input_error() {
        let series = wavy(30);
        assert!(matches!(
            optimize(&series, &[5], MaType::Ema, 0),
            Err(Error::Input(_))
        ));
        assert!(matches!(
            optimize(&series, &[5, 5], MaType::Ema, 0),
            Err(Error::Input(_))
        ));
    }

    #[test]
    fn empty_series_propagates_input_error() {
        let series = PriceSeries::empty("NONE");
        assert!(matches!(
            optimize(&series, &[5, 10], MaType::Ema, 0),
            Err(Error::Input(_))
        ));
    }

    #[test]
    fn buy_and_hold_and_chart_are_reported() {
        let series = series_from(&[100.0, 110.0, 105.0, 120.0, 125.0]);
        let opt = optimize(&series, &[2, 3], MaType::Sma, 0).unwrap();
        assert!((opt.buy_and_hold_pct - 25.0).abs() < 1e-9);

        let chart = opt.best_chart().unwrap();
        assert_eq!(chart.len(), 5);
        assert_eq!(chart[0].short_ma, None);
        assert!((chart[1].short_ma.unwrap() - 105.0).abs() < 1e-9);
        assert_eq!(chart[1].long_ma, None);
        assert!(opt.chart(2, 7).is_err());
    }

    #[test]
    fn label_is_short_slash_long() {
        let r = PairResult {
            short: 5,
            long: 20,
            total_gain_pct: 1.0,
            trade_count: 1,
        };
        assert_eq!(r.label(), "5/20");
    }
}
