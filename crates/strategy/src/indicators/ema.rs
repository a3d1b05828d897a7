/// Exponential Moving Average over every point of `closes` (oldest first).
///
/// Smoothing factor `2 / (period + 1)`, no bias correction. The value at
/// index `period - 1` is seeded with the simple average of the first `period`
/// closes; everything before it is `None`.
pub fn ema(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);

    // Seed with SMA of first `period` values
    let mut ema_val: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema_val);

    for (i, &price) in closes.iter().enumerate().skip(period) {
        ema_val = price * k + ema_val * (1.0 - k);
        out[i] = Some(ema_val);
    }
    out
}
