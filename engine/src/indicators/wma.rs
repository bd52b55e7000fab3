// Linearly weighted moving average over an already-derived value series
/// Causal rolling WMA with weights `1..=length` (oldest to newest), normalised
/// by their sum. An output is NaN until `length` values are available and
/// whenever the window holds a NaN.
pub fn wma(series: &[f64], length: usize) -> Vec<f64> {
    if length == 0 || series.len() < length {
        return vec![f64::NAN; series.len()];
    }

    let weight_sum = (length * (length + 1)) as f64 / 2.0;
    let mut results = vec![f64::NAN; length - 1];

    for window in series.windows(length) {
        if window.iter().any(|v| v.is_nan()) {
            results.push(f64::NAN);
            continue;
        }
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(i, v)| v * (i + 1) as f64)
            .sum();
        results.push(weighted / weight_sum);
    }
    results
}
