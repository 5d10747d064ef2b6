#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighbour weighting and local estimate aggregation.
//!
//! Each selected neighbour gets a raw weight of `size / d²` (or `1 / d²`
//! for unsized candidates such as LSOA centroids). Raw weights are
//! normalised to sum to 1 and the local estimate is the weighted sum of
//! the neighbours' target attribute:
//!
//! ```text
//! estimate = Σ (c_n / d_n²) · t_n  /  Σ (c_n / d_n²)
//! ```

use school_gap_models::{Neighbour, WeightedNeighbour};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How raw neighbour weights are formed.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Weighting {
    /// `size / d²`; every candidate must carry a size.
    #[default]
    BySize,
    /// Plain `1 / d²`.
    InverseSquare,
}

/// The weights of a neighbour set cannot be normalised.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DegenerateInputError {
    /// No neighbours were supplied.
    #[error("Neighbour set is empty")]
    Empty,

    /// Raw weights summed to zero (e.g. every neighbour has size 0).
    #[error("Raw weights sum to zero")]
    ZeroWeightSum,

    /// Raw weights summed to NaN or infinity.
    #[error("Raw weights sum to a non-finite value ({0})")]
    NonFiniteWeightSum(f64),

    /// Size weighting was requested for a candidate without a size.
    #[error("Candidate {id} has no size")]
    MissingSize {
        /// Identifier of the unsized candidate.
        id: String,
    },
}

/// Raw (unnormalised) weight of a single neighbour.
///
/// # Errors
///
/// Returns [`DegenerateInputError::MissingSize`] for an unsized candidate
/// under [`Weighting::BySize`].
pub fn raw_weight(
    neighbour: &Neighbour<'_>,
    weighting: Weighting,
) -> Result<f64, DegenerateInputError> {
    let inverse_square = neighbour.distance.powi(2).recip();

    match weighting {
        Weighting::InverseSquare => Ok(inverse_square),
        Weighting::BySize => neighbour
            .point
            .size
            .map(|size| size * inverse_square)
            .ok_or_else(|| DegenerateInputError::MissingSize {
                id: neighbour.point.id.clone(),
            }),
    }
}

/// Converts a neighbour set into weights that sum to 1.
///
/// # Errors
///
/// Returns [`DegenerateInputError`] if the set is empty, a size is missing
/// under [`Weighting::BySize`], or the raw weights sum to zero or a
/// non-finite value.
pub fn normalize(
    neighbours: &[Neighbour<'_>],
    weighting: Weighting,
) -> Result<Vec<WeightedNeighbour>, DegenerateInputError> {
    if neighbours.is_empty() {
        return Err(DegenerateInputError::Empty);
    }

    let raw = neighbours
        .iter()
        .map(|n| raw_weight(n, weighting))
        .collect::<Result<Vec<_>, _>>()?;

    let sum: f64 = raw.iter().sum();
    if !sum.is_finite() {
        return Err(DegenerateInputError::NonFiniteWeightSum(sum));
    }
    if sum <= 0.0 {
        return Err(DegenerateInputError::ZeroWeightSum);
    }

    Ok(neighbours
        .iter()
        .zip(raw)
        .map(|(n, w)| weighted(n, w / sum))
        .collect())
}

/// Weighted sum of the neighbours' target attribute.
#[must_use]
pub fn aggregate(weighted: &[WeightedNeighbour]) -> f64 {
    weighted.iter().map(|n| n.weight * n.target).sum()
}

/// Fallback for a degenerate set: the nearest neighbour's own target,
/// with all weight assigned to it.
///
/// Returns `None` only for an empty set.
#[must_use]
pub fn nearest_fallback(neighbours: &[Neighbour<'_>]) -> Option<(f64, Vec<WeightedNeighbour>)> {
    let nearest = neighbours.first()?;

    let detail = neighbours
        .iter()
        .enumerate()
        .map(|(rank, n)| weighted(n, if rank == 0 { 1.0 } else { 0.0 }))
        .collect();

    Some((nearest.point.target, detail))
}

fn weighted(neighbour: &Neighbour<'_>, weight: f64) -> WeightedNeighbour {
    WeightedNeighbour {
        id: neighbour.point.id.clone(),
        distance: neighbour.distance,
        size: neighbour.point.size,
        target: neighbour.point.target,
        weight,
    }
}

#[cfg(test)]
mod tests {
    use school_gap_models::{Point, Position};

    use super::*;

    fn point(id: &str, size: Option<f64>, target: f64) -> Point {
        Point {
            id: id.to_string(),
            position: Position::new(0.0, 0.0),
            size,
            target,
        }
    }

    #[test]
    fn size_weighted_example() {
        let a = point("a", Some(100.0), 10.0);
        let b = point("b", Some(100.0), 20.0);
        let neighbours = [
            Neighbour { point: &a, distance: 1.0 },
            Neighbour { point: &b, distance: 2.0 },
        ];

        let weighted = normalize(&neighbours, Weighting::BySize).unwrap();
        assert!((weighted[0].weight - 0.8).abs() < 1e-12);
        assert!((weighted[1].weight - 0.2).abs() < 1e-12);
        assert!((aggregate(&weighted) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn weights_sum_to_one() {
        let points: Vec<Point> = (1..=18_u32)
            .map(|i| point(&format!("p{i}"), Some(f64::from(i) * 37.0), f64::from(i)))
            .collect();
        let neighbours: Vec<Neighbour<'_>> = points
            .iter()
            .zip(0_u32..)
            .map(|(p, rank)| Neighbour {
                point: p,
                distance: 1000.0 + 250.0 * f64::from(rank),
            })
            .collect();

        for weighting in [Weighting::BySize, Weighting::InverseSquare] {
            let weighted = normalize(&neighbours, weighting).unwrap();
            let sum: f64 = weighted.iter().map(|n| n.weight).sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(weighted.iter().all(|n| (0.0..=1.0).contains(&n.weight)));
        }
    }

    #[test]
    fn zero_size_contributes_nothing() {
        let empty = point("closed-nursery", Some(0.0), 90.0);
        let full = point("full", Some(250.0), 15.0);
        let neighbours = [
            Neighbour { point: &empty, distance: 150.0 },
            Neighbour { point: &full, distance: 400.0 },
        ];

        let weighted = normalize(&neighbours, Weighting::BySize).unwrap();
        assert!(weighted[0].weight.abs() < f64::EPSILON);
        assert!((weighted[1].weight - 1.0).abs() < 1e-12);
        assert!((aggregate(&weighted) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn all_zero_sizes_are_degenerate() {
        let a = point("a", Some(0.0), 10.0);
        let b = point("b", Some(0.0), 20.0);
        let neighbours = [
            Neighbour { point: &a, distance: 100.0 },
            Neighbour { point: &b, distance: 200.0 },
        ];
        assert_eq!(
            normalize(&neighbours, Weighting::BySize).unwrap_err(),
            DegenerateInputError::ZeroWeightSum
        );
    }

    #[test]
    fn zero_distance_is_degenerate() {
        let a = point("a", Some(10.0), 10.0);
        let neighbours = [Neighbour { point: &a, distance: 0.0 }];
        assert!(matches!(
            normalize(&neighbours, Weighting::BySize),
            Err(DegenerateInputError::NonFiniteWeightSum(_))
        ));
    }

    #[test]
    fn missing_size_under_size_weighting() {
        let a = point("centroid", None, 0.2);
        let neighbours = [Neighbour { point: &a, distance: 500.0 }];
        assert!(matches!(
            normalize(&neighbours, Weighting::BySize),
            Err(DegenerateInputError::MissingSize { .. })
        ));
        let weighted = normalize(&neighbours, Weighting::InverseSquare).unwrap();
        assert!((aggregate(&weighted) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn inverse_square_ignores_size() {
        let a = point("a", Some(1.0), 0.1);
        let b = point("b", Some(1000.0), 0.5);
        let neighbours = [
            Neighbour { point: &a, distance: 1000.0 },
            Neighbour { point: &b, distance: 1000.0 },
        ];
        let weighted = normalize(&neighbours, Weighting::InverseSquare).unwrap();
        assert!((aggregate(&weighted) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn empty_set_is_degenerate() {
        assert_eq!(
            normalize(&[], Weighting::InverseSquare).unwrap_err(),
            DegenerateInputError::Empty
        );
        assert!(nearest_fallback(&[]).is_none());
    }

    #[test]
    fn fallback_uses_nearest_target() {
        let a = point("a", Some(0.0), 33.0);
        let b = point("b", Some(0.0), 20.0);
        let neighbours = [
            Neighbour { point: &a, distance: 100.0 },
            Neighbour { point: &b, distance: 300.0 },
        ];
        let (estimate, detail) = nearest_fallback(&neighbours).unwrap();
        assert!((estimate - 33.0).abs() < f64::EPSILON);
        assert!((detail[0].weight - 1.0).abs() < f64::EPSILON);
        assert!(detail[1].weight.abs() < f64::EPSILON);
    }
}
