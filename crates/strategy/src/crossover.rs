use chrono::NaiveDate;
use serde::Serialize;

use common::{Crossover, Result, Signal};

use crate::gap::ma_gaps;
use crate::indicators::MovingAverageSeries;

/// Per-date crossover signals aligned with the price series' dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSeries {
    dates: Vec<NaiveDate>,
    signals: Vec<Signal>,
}

impl SignalSeries {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Signal on the most recent date.
    pub fn latest(&self) -> Signal {
        self.signals.last().copied().unwrap_or_default()
    }

    /// Most recent non-zero signal and its date, however long ago.
    pub fn last_crossover(&self) -> Option<Crossover> {
        self.dates
            .iter()
            .zip(&self.signals)
            .rev()
            .find(|(_, s)| s.is_crossover())
            .map(|(&date, &signal)| Crossover { signal, date })
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Signal)> + '_ {
        self.dates.iter().copied().zip(self.signals.iter().copied())
    }
}

/// Derives crossover signals from a short and a long moving average.
///
/// The condition on each date is `short > long`; dates where either average
/// is still warming up count as `false`. With `confirmation_days > 0` the
/// condition only counts once it has held for `confirmation_days + 1`
/// consecutive dates. A signal is emitted where the confirmed condition
/// flips: `Buy` on false→true, `Sell` on true→false. The first date never
/// carries a signal.
///
/// Both the backtest and the live alert check go through here.
pub fn detect_crossovers(
    short: &MovingAverageSeries,
    long: &MovingAverageSeries,
    confirmation_days: usize,
) -> Result<SignalSeries> {
    let gaps = ma_gaps(short, long)?;
    let required_run = confirmation_days + 1;

    let mut signals = Vec::with_capacity(gaps.len());
    let mut run = 0usize;
    let mut prev_confirmed = false;

    for (i, gap) in gaps.iter().enumerate() {
        let above = gap.is_some_and(|g| g > 0.0);
        run = if above { run + 1 } else { 0 };
        let confirmed = run >= required_run;

        let signal = match (i, prev_confirmed, confirmed) {
            (0, _, _) => Signal::None,
            (_, false, true) => Signal::Buy,
            (_, true, false) => Signal::Sell,
            _ => Signal::None,
        };
        signals.push(signal);
        prev_confirmed = confirmed;
    }

    Ok(SignalSeries {
        dates: short.dates().to_vec(),
        signals,
    })
}
