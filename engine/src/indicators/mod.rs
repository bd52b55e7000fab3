// Technical indicators module
pub mod atr;
pub mod knn;
pub mod sma;
pub mod trend_line;
pub mod wma;

pub use atr::average_true_range;
pub use trend_line::{TrendLine, TrendLineParams};

use serde_json::Value;
use shared::models::Candle;

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    fn name(&self) -> &str;
    fn parameters(&self) -> Value; // Parameters used for this indicator instance
    // Same length as `data`; NaN where the indicator is not yet defined.
    fn calculate(&self, data: &[Candle]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Close,
    Hl2,
}

impl PriceSource {
    pub fn extract(&self, data: &[Candle]) -> Vec<f64> {
        match self {
            PriceSource::Close => data.iter().map(|c| c.close).collect(),
            PriceSource::Hl2 => data.iter().map(Candle::hl2).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use shared::models::Candle;

    pub(crate) fn create_candle(close: f64) -> Candle {
        Candle {
            symbol: "TEST".to_string(),
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
            confirmed: true,
        }
    }

    pub(crate) fn assert_f64_vec_eq(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len(), "Vectors differ in length");
        for (i, (val_a, val_b)) in a.iter().zip(b.iter()).enumerate() {
            if val_a.is_nan() && val_b.is_nan() {
                // Both are NaN, consider them equal for this test
            } else {
                assert!(
                    (val_a - val_b).abs() < 1e-9,
                    "Mismatch at index {}: {} != {}",
                    i,
                    val_a,
                    val_b
                );
            }
        }
    }
}
