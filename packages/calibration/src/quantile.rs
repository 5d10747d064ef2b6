//! Linear-interpolation quantiles.
//!
//! For `n` sorted values the `q`-quantile sits at fractional rank
//! `q * (n - 1)` and is interpolated between its two neighbouring values.

use school_gap_models::QuantileBreakpoints;

/// Quantile of already-sorted `values`.
///
/// Returns `None` for an empty slice or `q` outside `[0, 1]`.
#[must_use]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let rank = q * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    #[allow(clippy::cast_precision_loss)]
    let fraction = rank - lower as f64;

    Some((sorted[upper] - sorted[lower]).mul_add(fraction, sorted[lower]))
}

/// Quantile of unsorted `values`.
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted_copy(values), q)
}

/// 50th percentile.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// The 10th/25th/50th/75th/90th percentile breakpoints of `values`.
#[must_use]
pub fn breakpoints(values: &[f64]) -> Option<QuantileBreakpoints> {
    let sorted = sorted_copy(values);

    Some(QuantileBreakpoints {
        q10: quantile_sorted(&sorted, 0.10)?,
        q25: quantile_sorted(&sorted, 0.25)?,
        q50: quantile_sorted(&sorted, 0.50)?,
        q75: quantile_sorted(&sorted, 0.75)?,
        q90: quantile_sorted(&sorted, 0.90)?,
    })
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}
