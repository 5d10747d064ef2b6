//! Diagnostics for choosing and explaining `k`.

use school_gap_models::{Position, ScoredSubject};
use school_gap_spatial::GeoPointStore;
use school_gap_weighting::{Weighting, aggregate, normalize};
use serde::Serialize;

use crate::{EngineError, GapParams};

/// Local estimate at one position for a given `k`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRow {
    pub k: usize,
    /// Adjusted distance of the k-th neighbour.
    pub kth_distance: f64,
    /// `None` when the first `k` weights are degenerate.
    pub local_estimate: Option<f64>,
}

/// Computes the local estimate at `origin` for every `k` in `1..=k_max`.
///
/// The neighbour set for `k` is the first `k` entries of the set for
/// `k_max`, so one query serves the whole sweep. Under size weighting,
/// candidates without a size are left out.
///
/// # Errors
///
/// Returns [`EngineError`] if `k_max` or the offset is invalid for
/// `store`, or the target scale is invalid.
pub fn sweep_k(
    store: &GeoPointStore,
    origin: Position,
    k_max: usize,
    params: &GapParams,
) -> Result<Vec<SweepRow>, EngineError> {
    params.validate()?;
    let sized = match params.weighting {
        Weighting::BySize => store.sized_only(),
        Weighting::InverseSquare => None,
    };
    let store = sized.as_ref().unwrap_or(store);
    let neighbours = store.nearest(origin, k_max, params.distance_offset)?;

    Ok(neighbours
        .iter()
        .enumerate()
        .map(|(i, kth)| SweepRow {
            k: i + 1,
            kth_distance: kth.distance,
            local_estimate: normalize(&neighbours[..=i], params.weighting)
                .ok()
                .map(|weighted| aggregate(&weighted) * params.target_scale),
        })
        .collect())
}

/// Share of total weight carried by each neighbour rank across `subjects`.
///
/// Entry `n` is the sum of every subject's rank-`n` weight, normalised so
/// the profile sums to 1. Empty when no subject has neighbours.
#[must_use]
pub fn weight_rank_profile(subjects: &[ScoredSubject]) -> Vec<f64> {
    let ranks = subjects
        .iter()
        .map(|s| s.neighbours.len())
        .max()
        .unwrap_or(0);
    let mut totals = vec![0.0; ranks];

    for subject in subjects {
        for (total, neighbour) in totals.iter_mut().zip(&subject.neighbours) {
            *total += neighbour.weight;
        }
    }

    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        for total in &mut totals {
            *total /= sum;
        }
    }

    totals
}
