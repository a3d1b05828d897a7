use chrono::NaiveDate;
use serde::Serialize;

use common::{Error, PriceSeries, Result, Signal};

use crate::crossover::SignalSeries;

/// One entry of the simulated trade log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trade {
    Buy {
        date: NaiveDate,
        price: f64,
    },
    Sell {
        date: NaiveDate,
        price: f64,
        gain_pct: f64,
    },
    /// Position still open when the series ends, marked to the last close.
    Hold {
        current_price: f64,
        unrealized_gain_pct: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    /// Sum of per-trade percentage gains, including an open position marked
    /// to the final close.
    pub total_gain_pct: f64,
    pub trades: Vec<Trade>,
}

impl BacktestResult {
    /// Number of positions opened.
    pub fn trade_count(&self) -> usize {
        self.trades
            .iter()
            .filter(|t| matches!(t, Trade::Buy { .. }))
            .count()
    }

    /// Realized gains of the closed round trips, in order.
    pub fn realized_gains(&self) -> impl Iterator<Item = f64> + '_ {
        self.trades.iter().filter_map(|t| match t {
            Trade::Sell { gain_pct, .. } => Some(*gain_pct),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Position {
    Flat,
    Long { entry: f64 },
}

/// Replays `signals` against the closes of `series`, long-only, one position
/// at a time.
///
/// A `Buy` while flat opens at that date's close; a `Sell` while long closes
/// at that date's close. Repeated signals in the same direction are ignored.
pub fn simulate(series: &PriceSeries, signals: &SignalSeries) -> Result<BacktestResult> {
    if series.len() != signals.len()
        || series
            .points()
            .iter()
            .zip(signals.dates())
            .any(|(p, d)| p.date != *d)
    {
        return Err(Error::input(format!(
            "{}: signal series is not aligned with the price series",
            series.ticker()
        )));
    }

    let mut position = Position::Flat;
    let mut total_gain_pct = 0.0;
    let mut trades = Vec::new();

    for (point, &signal) in series.points().iter().zip(signals.signals()) {
        match (position, signal) {
            (Position::Flat, Signal::Buy) => {
                position = Position::Long { entry: point.close };
                trades.push(Trade::Buy {
                    date: point.date,
                    price: point.close,
                });
            }
            (Position::Long { entry }, Signal::Sell) => {
                let gain_pct = gain_pct(entry, point.close);
                total_gain_pct += gain_pct;
                position = Position::Flat;
                trades.push(Trade::Sell {
                    date: point.date,
                    price: point.close,
                    gain_pct,
                });
            }
            _ => {}
        }
    }

    // If still holding at the end, mark to the last close
    if let (Position::Long { entry }, Some(last)) = (position, series.last()) {
        let unrealized_gain_pct = gain_pct(entry, last.close);
        total_gain_pct += unrealized_gain_pct;
        trades.push(Trade::Hold {
            current_price: last.close,
            unrealized_gain_pct,
        });
    }

    Ok(BacktestResult {
        total_gain_pct,
        trades,
    })
}

fn gain_pct(entry: f64, exit: f64) -> f64 {
    (exit - entry) / entry * 100.0
}

#[cfg(test)]
mod tests {
    use common::{MaKey, MaType};

    use super::*;
    use crate::crossover::detect_crossovers;
    use crate::indicators::test_support::series_from;
    use crate::indicators::MovingAverageSeries;

    /// Builds signals directly by running the detector on hand-made lines whose
    /// sign pattern encodes the desired crossings.
    fn signals_for(series: &PriceSeries, above: &[bool]) -> SignalSeries {
        let dates = series.dates();
        let short = MovingAverageSeries::from_values(
            MaKey::new(MaType::Sma, 1),
            dates.clone(),
            above.iter().map(|&a| Some(if a { 2.0 } else { 0.0 })).collect(),
        )
        .unwrap();
        let long = MovingAverageSeries::from_values(
            MaKey::new(MaType::Sma, 2),
            dates,
            vec![Some(1.0); above.len()],
        )
        .unwrap();
        detect_crossovers(&short, &long, 0).unwrap()
    }

    #[test]
    fn no_signals_means_no_trades() {
        let series = series_from(&[100.0, 101.0, 99.0]);
        let result = simulate(&series, &signals_for(&series, &[false; 3])).unwrap();
        assert_eq!(result.total_gain_pct, 0.0);
        assert!(result.trades.is_empty());
        assert_eq!(result.trade_count(), 0);
    }

    #[test]
    fn buy_at_100_sell_at_110_is_ten_percent() {
        let series = series_from(&[90.0, 100.0, 105.0, 110.0]);
        let result =
            simulate(&series, &signals_for(&series, &[false, true, true, false])).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert!(matches!(result.trades[0], Trade::Buy { price, .. } if price == 100.0));
        match result.trades[1] {
            Trade::Sell { price, gain_pct, .. } => {
                assert_eq!(price, 110.0);
                assert_eq!(gain_pct, 10.0);
            }
            ref other => panic!("expected sell, got {other:?}"),
        }
        assert_eq!(result.total_gain_pct, 10.0);
        assert_eq!(result.trade_count(), 1);
    }

    #[test]
    fn open_position_is_marked_to_last_close() {
        let series = series_from(&[100.0, 100.0, 120.0, 150.0]);
        let result =
            simulate(&series, &signals_for(&series, &[false, true, true, true])).unwrap();

        assert_eq!(result.trades.len(), 2);
        match result.trades[1] {
            Trade::Hold {
                current_price,
                unrealized_gain_pct,
            } => {
                assert_eq!(current_price, 150.0);
                assert!((unrealized_gain_pct - 50.0).abs() < 1e-9);
            }
            ref other => panic!("expected hold, got {other:?}"),
        }
        assert!((result.total_gain_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn gains_accumulate_over_round_trips() {
        let series = series_from(&[10.0, 10.0, 12.0, 10.0, 8.0, 6.0]);
        // buy 10 (d1) sell 12 (d2): +20%; buy 10 (d3) sell 6 (d5): -40%
        let result = simulate(
            &series,
            &signals_for(&series, &[false, true, false, true, true, false]),
        )
        .unwrap();
        let gains: Vec<f64> = result.realized_gains().collect();
        assert_eq!(gains.len(), 2);
        assert!((gains[0] - 20.0).abs() < 1e-9);
        assert!((gains[1] + 40.0).abs() < 1e-9);
        assert!((result.total_gain_pct + 20.0).abs() < 1e-9);
    }

    #[test]
    fn trade_log_serializes_with_type_tag() {
        let series = series_from(&[90.0, 100.0, 110.0]);
        let result = simulate(&series, &signals_for(&series, &[false, true, true])).unwrap();
        let json = serde_json::to_value(&result.trades).unwrap();
        assert_eq!(json[0]["type"], "buy");
        assert_eq!(json[1]["type"], "hold");
    }

    #[test]
    fn misaligned_signals_are_rejected() {
        let series = series_from(&[1.0, 2.0, 3.0]);
        let other = series_from(&[1.0, 2.0]);
        let signals = signals_for(&other, &[false, true]);
        assert!(simulate(&series, &signals).is_err());
    }
}
