/// Trailing Simple Moving Average over every point of `closes`.
/// The first `period - 1` entries are `None`.
pub fn sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let mut sum: f64 = closes[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);

    // Roll the window forward
    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_5_basic() {
        let values = sma(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);
        assert_eq!(values.len(), 7);
        assert!(values[..4].iter().all(Option::is_none));
        assert!((values[4].unwrap() - 12.0).abs() < 1e-12);
        assert!((values[5].unwrap() - 13.0).abs() < 1e-12);
        assert!((values[6].unwrap() - 14.0).abs() < 1e-12);
    }

    #[test]
    fn sma_1_is_close() {
        let values = sma(&[100.0, 200.0, 300.0], 1);
        assert_eq!(values, vec![Some(100.0), Some(200.0), Some(300.0)]);
    }
}
