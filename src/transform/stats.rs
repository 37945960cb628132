use statrs::statistics::Statistics;

/// Trailing window for `rolling_avg`.
pub const ROLLING_WINDOW: usize = 3;

/// Percent change against the previous row. Row 0 has no predecessor.
pub fn percentage_change(prices: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(prices.len());
    if prices.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(
        prices
            .windows(2)
            .map(|w| finite((w[1] - w[0]) / w[0] * 100.0)),
    );
    out
}

/// Standard score of every price against the whole batch, using the
/// population standard deviation.
pub fn zscore(prices: &[f64]) -> Vec<Option<f64>> {
    let mean = prices.iter().copied().mean();
    let std_dev = prices.iter().copied().population_std_dev();
    prices
        .iter()
        .map(|p| finite((p - mean) / std_dev))
        .collect()
}

/// Mean of the current row and the `ROLLING_WINDOW - 1` rows before it.
pub fn rolling_mean(prices: &[f64]) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            if i + 1 < ROLLING_WINDOW {
                return None;
            }
            finite(prices[i + 1 - ROLLING_WINDOW..=i].iter().copied().mean())
        })
        .collect()
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}
