// KNN trend line ("knnMA"): KNN regression of the hl2 mean towards the close
// mean, smoothed with a WMA
use super::knn::{knn_smooth, knn_window};
use super::sma::rolling_mean;
use super::wma::wma;
use super::{IndicatorCalculator, PriceSource};
use serde_json::Value;
use shared::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendLineParams {
    pub price_len: usize,
    pub target_len: usize,
    pub neighbors: usize,
    pub smoothing_len: usize,
}

impl Default for TrendLineParams {
    fn default() -> Self {
        Self {
            price_len: 5,
            target_len: 5,
            neighbors: 3,
            smoothing_len: 5,
        }
    }
}

pub struct TrendLine {
    name: String,
    params: TrendLineParams,
}

impl TrendLine {
    pub fn new(params: TrendLineParams) -> Self {
        Self {
            name: format!(
                "knnMA({}, {}, {}, {})",
                params.price_len, params.target_len, params.neighbors, params.smoothing_len
            ),
            params,
        }
    }

    /// Index of the first value that can be defined on gap-free input.
    ///
    /// The KNN step needs a full window, a defined target, and at least
    /// `neighbors` defined values inside the window. The value series is NaN
    /// for its first `price_len - 1` points, and those sort last, so with a
    /// long `price_len` the last condition is the binding one.
    pub fn first_defined_index(&self) -> usize {
        let p = self.params;
        let value_start = p.price_len.saturating_sub(1);
        let target_start = p.target_len.saturating_sub(1);
        let knn_start = knn_window(p.neighbors)
            .max(target_start)
            .max(value_start + p.neighbors);
        knn_start + p.smoothing_len.saturating_sub(1)
    }

    /// Shortest candle history whose trend line has a defined
    /// three-point tail.
    pub fn min_history(&self) -> usize {
        self.first_defined_index() + 3
    }

    /// Trend line from already-derived value and target series.
    pub fn from_series(&self, value: &[f64], target: &[f64]) -> Vec<f64> {
        let knn = knn_smooth(value, target, self.params.neighbors);
        wma(&knn, self.params.smoothing_len)
    }
}

impl IndicatorCalculator for TrendLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "price_len": self.params.price_len,
            "target_len": self.params.target_len,
            "neighbors": self.params.neighbors,
            "smoothing_len": self.params.smoothing_len,
        })
    }

    fn calculate(&self, data: &[Candle]) -> Vec<f64> {
        let value = rolling_mean(&PriceSource::Hl2.extract(data), self.params.price_len);
        let target = rolling_mean(&PriceSource::Close.extract(data), self.params.target_len);
        self.from_series(&value, &target)
    }
}
