//! Gap between a short and a long moving average.
//!
//! Crossover detection and the live trend readout both derive from the same
//! signed gap `short - long`, so they cannot disagree about which side of the
//! long MA the short one sits on.

use common::{CheckData, Error, Result, Trend};

use crate::indicators::MovingAverageSeries;

/// Signed `short - long` per date; `None` wherever either MA is undefined.
pub fn ma_gaps(short: &MovingAverageSeries, long: &MovingAverageSeries) -> Result<Vec<Option<f64>>> {
    if short.dates() != long.dates() {
        return Err(Error::input(format!(
            "{} and {} are not aligned to the same dates",
            short.key(),
            long.key()
        )));
    }
    Ok(short
        .values()
        .iter()
        .zip(long.values())
        .map(|(s, l)| match (s, l) {
            (Some(s), Some(l)) => Some(s - l),
            _ => None,
        })
        .collect())
}

/// Reads the last two dates of the pair and classifies the trend.
///
/// `Converging` when the absolute gap shrank from the previous date to the
/// latest one, `Diverging` otherwise. When converging, the days until the
/// lines meet are extrapolated from the latest rate of convergence.
/// With fewer than two defined gaps the trend is `N/A`.
pub fn classify_trend(short: &MovingAverageSeries, long: &MovingAverageSeries) -> Result<CheckData> {
    let gaps = ma_gaps(short, long)?;
    let n = gaps.len();
    if n == 0 {
        return Ok(CheckData::default());
    }

    let mut data = CheckData {
        short_val: short.get(n - 1).map(round2),
        long_val: long.get(n - 1).map(round2),
        ..CheckData::default()
    };

    let (Some(prev), Some(curr)) = (n.checked_sub(2).and_then(|i| gaps[i]), gaps[n - 1]) else {
        return Ok(data);
    };

    let prev_gap = prev.abs();
    let curr_gap = curr.abs();
    if curr_gap < prev_gap {
        data.trend = Trend::Converging;
        data.estimated_days_to_crossover = estimate_days(prev_gap, curr_gap);
    } else {
        data.trend = Trend::Diverging;
    }
    Ok(data)
}

fn estimate_days(prev_gap: f64, curr_gap: f64) -> Option<u32> {
    let rate = prev_gap - curr_gap;
    if rate <= 0.0 {
        return None;
    }
    let days = (curr_gap / rate).floor();
    days.is_finite().then(|| days.min(u32::MAX as f64) as u32)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
