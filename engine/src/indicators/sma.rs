// Simple Moving Average (SMA)

/// Trailing mean over `period` values. The first `period - 1` outputs are NaN,
/// as is any output whose window contains a NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return vec![f64::NAN; values.len()];
    }

    let mut results = vec![f64::NAN; period - 1];
    for window in values.windows(period) {
        // NaN propagates through the sum, matching a strict rolling mean.
        let sum: f64 = window.iter().sum();
        results.push(sum / period as f64);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::{assert_f64_vec_eq, create_candle};
    use crate::indicators::PriceSource;
    use shared::models::Candle;

    #[test]
    fn test_sma_calculation() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        // expected: NaN, NaN, (1+2+3)/3=2.0, (2+3+4)/3=3.0, (3+4+5)/3=4.0
        assert_f64_vec_eq(&rolling_mean(&closes, 3), &[f64::NAN, f64::NAN, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sma_hl2_source() {
        let mut candle = create_candle(10.0);
        candle.high = 12.0;
        candle.low = 8.0;
        let hl2 = PriceSource::Hl2.extract(&[candle]);
        assert_f64_vec_eq(&rolling_mean(&hl2, 1), &[10.0]);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let candles: Vec<Candle> = vec![create_candle(1.0), create_candle(2.0)];
        let closes = PriceSource::Close.extract(&candles);
        assert_f64_vec_eq(&rolling_mean(&closes, 3), &[f64::NAN, f64::NAN]);
    }

    #[test]
    fn test_sma_period_one() {
        // SMA(1) is just the input
        assert_f64_vec_eq(&rolling_mean(&[1.0, 2.0, 3.0], 1), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rolling_mean_propagates_nan_windows() {
        let values = [f64::NAN, 2.0, 4.0, 6.0];
        assert_f64_vec_eq(&rolling_mean(&values, 2), &[f64::NAN, f64::NAN, 3.0, 5.0]);
    }

    #[test]
    fn test_sma_empty_and_zero_period() {
        assert_f64_vec_eq(&rolling_mean(&[], 3), &[]);
        assert_f64_vec_eq(&rolling_mean(&[1.0, 2.0], 0), &[f64::NAN, f64::NAN]);
    }
}
