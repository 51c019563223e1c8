//! Relative Strength Index with Wilder smoothing.
//!
//! The first `period` deltas seed plain averages of gains and losses;
//! every later delta is folded in with exponential (Wilder) smoothing.
//!
//! ```text
//! RS  = avg_gain / avg_loss
//! RSI = 100 - 100 / (1 + RS)
//! ```

/// Lookback used throughout the scanner.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Compute the RSI of the last sample in `prices`.
///
/// Returns `None` when there are fewer than `period` prices. A series
/// without any losses saturates at `100.0`.
pub fn compute_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let p = period as f64;
    let mut gains = 0.0;
    let mut losses = 0.0;

    // Seed: deltas 1..=period (fewer when the series is exactly `period` long).
    for w in prices.windows(2).take(period) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }

    let mut avg_gain = gains / p;
    let mut avg_loss = losses / p;

    for w in prices.windows(2).skip(period) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            avg_gain = (avg_gain * (p - 1.0) + delta) / p;
            avg_loss = (avg_loss * (p - 1.0)) / p;
        } else {
            avg_loss = (avg_loss * (p - 1.0) - delta) / p;
            avg_gain = (avg_gain * (p - 1.0)) / p;
        }
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
