//! Differencing and its inverse.

/// Difference `series` `d` times. Each pass shortens the series by one.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        if out.len() < 2 {
            return Vec::new();
        }
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Last value of the series at each differencing level `0..d`.
///
/// These are the anchors needed to undo differencing after the end of the
/// series, without keeping the series itself.
pub fn level_tails(series: &[f64], d: usize) -> Vec<f64> {
    (0..d)
        .filter_map(|level| difference(series, level).last().copied())
        .collect()
}

/// Undo differencing of a continuation using the anchors from [`level_tails`].
pub fn integrate(continuation: &[f64], tails: &[f64]) -> Vec<f64> {
    let mut path = continuation.to_vec();
    for &anchor in tails.iter().rev() {
        let mut last = anchor;
        for v in path.iter_mut() {
            last += *v;
            *v = last;
        }
    }
    path
}
