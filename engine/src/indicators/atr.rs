// Average True Range (ATR), simple-mean variant
use shared::models::Candle;

/// True range per candle. The first candle has no previous close, so its
/// entry is NaN.
pub fn true_ranges(data: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len());
    if data.is_empty() {
        return out;
    }
    out.push(f64::NAN);
    for pair in data.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let tr = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
        out.push(tr);
    }
    out
}

/// Mean true range over the last `lookback` candles, or `None` when fewer
/// than `lookback + 1` candles are available.
pub fn average_true_range(data: &[Candle], lookback: usize) -> Option<f64> {
    if lookback == 0 || data.len() < lookback + 1 {
        return None;
    }
    let tail = &data[data.len() - lookback - 1..];
    let trs = true_ranges(tail);
    let sum: f64 = trs[1..].iter().sum();
    Some(sum / lookback as f64)
}
