pub mod ema;
pub mod sma;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use common::{Error, MaKey, MaType, PriceSeries, Result};

pub use ema::ema;
pub use sma::sma;

/// One moving average aligned 1:1 with the dates of the series it was
/// computed from. Entries inside the warm-up window are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovingAverageSeries {
    key: MaKey,
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl MovingAverageSeries {
    /// Wraps precomputed values. `dates` and `values` must have equal length.
    pub fn from_values(
        key: MaKey,
        dates: Vec<NaiveDate>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(Error::input(format!(
                "{key}: {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        Ok(Self { key, dates, values })
    }

    pub fn key(&self) -> MaKey {
        self.key
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Moving averages keyed by (type, period).
pub type MaSet = BTreeMap<MaKey, MovingAverageSeries>;

/// Computes one moving average per period over `series`' closes.
///
/// Duplicate periods collapse into one entry. Fails on an empty period list,
/// a zero period, or an empty series.
pub fn compute_moving_averages(
    series: &PriceSeries,
    periods: &[usize],
    ma_type: MaType,
) -> Result<MaSet> {
    if periods.is_empty() {
        return Err(Error::input("at least one moving average period is required"));
    }
    if let Some(&bad) = periods.iter().find(|&&p| p == 0) {
        return Err(Error::input(format!("period must be a positive integer, got {bad}")));
    }
    if series.is_empty() {
        return Err(Error::input(format!(
            "{}: cannot compute moving averages over an empty series",
            series.ticker()
        )));
    }

    let closes = series.closes();
    let dates = series.dates();

    let mut set = MaSet::new();
    for &period in periods {
        let key = MaKey::new(ma_type, period);
        if set.contains_key(&key) {
            continue;
        }
        let values = match ma_type {
            MaType::Ema => ema(&closes, period),
            MaType::Sma => sma(&closes, period),
        };
        set.insert(
            key,
            MovingAverageSeries {
                key,
                dates: dates.clone(),
                values,
            },
        );
    }
    Ok(set)
}

/// Fetches the series for `key`, failing with an input error if it was not
/// computed.
pub fn lookup(set: &MaSet, key: MaKey) -> Result<&MovingAverageSeries> {
    set.get(&key)
        .ok_or_else(|| Error::input(format!("moving average {key} was not computed")))
}


#[cfg(test)]
mod tests {
    use super::test_support::series_from;
    use super::*;

    #[test]
    fn one_series_per_distinct_period() {
        let series = series_from(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let set = compute_moving_averages(&series, &[2, 3, 2], MaType::Sma).unwrap();
        assert_eq!(set.len(), 2);
        let sma3 = lookup(&set, MaKey::new(MaType::Sma, 3)).unwrap();
        assert_eq!(sma3.len(), 6);
        assert_eq!(sma3.dates(), series.dates().as_slice());
        assert_eq!(sma3.get(1), None);
        assert!((sma3.get(2).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_series_is_an_input_error() {
        let series = PriceSeries::empty("NONE");
        let err = compute_moving_averages(&series, &[5], MaType::Ema).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn zero_period_is_rejected() {
        let series = series_from(&[1.0, 2.0, 3.0]);
        assert!(compute_moving_averages(&series, &[0, 2], MaType::Ema).is_err());
        assert!(compute_moving_averages(&series, &[], MaType::Ema).is_err());
    }

    #[test]
    fn missing_key_lookup_fails() {
        let series = series_from(&[1.0, 2.0, 3.0]);
        let set = compute_moving_averages(&series, &[2], MaType::Ema).unwrap();
        assert!(lookup(&set, MaKey::new(MaType::Sma, 2)).is_err());
    }
}
