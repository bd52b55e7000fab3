// K-nearest-neighbour local regression over a trailing window
use std::cmp::Ordering;

/// Minimum trailing window the neighbour search looks back over.
pub const MIN_WINDOW: usize = 30;

pub fn knn_window(k: usize) -> usize {
    k.max(MIN_WINDOW)
}

/// For each `i >= window`, averages the `k` values of `value[i-window..i]`
/// closest to `target[i]`. The current point is never part of its own
/// neighbourhood. Ties keep index order; NaN distances sort last, and an
/// output is NaN if the target is NaN or a selected neighbour is NaN.
pub fn knn_smooth(value: &[f64], target: &[f64], k: usize) -> Vec<f64> {
    let len = value.len().min(target.len());
    let window = knn_window(k);
    let mut out = vec![f64::NAN; len];
    if k == 0 {
        return out;
    }

    let mut order: Vec<usize> = Vec::with_capacity(window);
    for i in window..len {
        let t = target[i];
        if t.is_nan() {
            continue;
        }
        let slice = &value[i - window..i];

        order.clear();
        order.extend(0..window);
        // sort_by is stable, which fixes tie resolution to index order.
        order.sort_by(|&a, &b| compare_distance((slice[a] - t).abs(), (slice[b] - t).abs()));

        let selected = &order[..k.min(window)];
        let sum: f64 = selected.iter().map(|&j| slice[j]).sum();
        out[i] = sum / selected.len() as f64;
    }
    out
}

fn compare_distance(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
