#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory candidate store for nearest-neighbour weighting.
//!
//! Validates candidate records (primary schools or LSOA centroids), builds
//! an R-tree over their positions, and answers k-nearest queries for each
//! subject. The store is immutable once loaded, so a single instance can
//! be shared by reference across worker threads.

use school_gap_models::{
    CandidateRecord, Neighbour, Point, Position, RequiredFields, ValidationError,
};

use rstar::RTree;
use rstar::primitives::GeomWithData;

/// Distance substituted for a coincident candidate when no offset is
/// configured, in metres.
pub const MIN_DISTANCE: f64 = 100.0;

/// Errors for queries that can never succeed against this store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidParameterError {
    /// `k` must satisfy `1 <= k <= candidates`.
    #[error("k = {k} is out of range (1..={available})")]
    KOutOfRange {
        /// Requested neighbour count.
        k: usize,
        /// Number of candidates in the store.
        available: usize,
    },

    /// The distance offset was negative.
    #[error("Distance offset must be non-negative, got {0}")]
    NegativeOffset(f64),

    /// The distance offset was NaN or infinite.
    #[error("Distance offset must be finite, got {0}")]
    NonFiniteOffset(f64),

    /// No candidates survived loading.
    #[error("Candidate set is empty")]
    EmptyCandidateSet,
}

/// R-tree entry: a position tagged with its index into `points`.
type IndexedPosition = GeomWithData<[f64; 2], usize>;

/// Immutable collection of validated candidate points.
pub struct GeoPointStore {
    points: Vec<Point>,
    tree: RTree<IndexedPosition>,
    rejected: Vec<ValidationError>,
}

impl GeoPointStore {
    /// Validates `records` and builds the spatial index.
    ///
    /// Records failing validation are excluded (never imputed) and kept in
    /// [`Self::rejected`] so the caller can report them.
    #[must_use]
    pub fn load<I>(records: I, required: RequiredFields) -> Self
    where
        I: IntoIterator<Item = CandidateRecord>,
    {
        let mut points = Vec::new();
        let mut rejected = Vec::new();

        for record in records {
            match Point::from_record(record, required) {
                Ok(point) => points.push(point),
                Err(e) => {
                    log::debug!("Excluding candidate: {e}");
                    rejected.push(e);
                }
            }
        }

        let mut store = Self::from_points(points);
        store.rejected = rejected;

        log::info!(
            "Loaded {} candidate points into spatial index ({} excluded)",
            store.len(),
            store.rejected.len()
        );

        store
    }

    /// Builds a store from already-validated points, preserving their order.
    #[must_use]
    pub fn from_points(points: Vec<Point>) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(idx, point)| IndexedPosition::new(point.position.as_array(), idx))
            .collect();

        Self {
            points,
            tree: RTree::bulk_load(entries),
            rejected: Vec::new(),
        }
    }

    /// All candidates in load order.
    #[must_use]
    pub fn all(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Records excluded during [`Self::load`].
    #[must_use]
    pub fn rejected(&self) -> &[ValidationError] {
        &self.rejected
    }

    /// Whether every candidate carries a size.
    #[must_use]
    pub fn all_sized(&self) -> bool {
        self.points.iter().all(|p| p.size.is_some())
    }

    /// Checks `k` and `offset` against this store.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameterError`] if the store is empty, `k` is out
    /// of range, or `offset` is negative or non-finite.
    pub fn validate_query(&self, k: usize, offset: f64) -> Result<(), InvalidParameterError> {
        if self.is_empty() {
            return Err(InvalidParameterError::EmptyCandidateSet);
        }
        if k == 0 || k > self.len() {
            return Err(InvalidParameterError::KOutOfRange {
                k,
                available: self.len(),
            });
        }
        if !offset.is_finite() {
            return Err(InvalidParameterError::NonFiniteOffset(offset));
        }
        if offset < 0.0 {
            return Err(InvalidParameterError::NegativeOffset(offset));
        }
        Ok(())
    }

    /// A copy of this store without the candidates that carry no size.
    ///
    /// Each dropped candidate is recorded in [`Self::rejected`] as a
    /// missing `size`. Returns `None` when every candidate is sized.
    #[must_use]
    pub fn sized_only(&self) -> Option<Self> {
        if self.all_sized() {
            return None;
        }

        let mut rejected = self.rejected.clone();
        let points = self
            .points
            .iter()
            .filter(|point| {
                if point.size.is_some() {
                    return true;
                }
                rejected.push(ValidationError::Missing {
                    record: point.id.clone(),
                    field: "size",
                });
                false
            })
            .cloned()
            .collect();

        let mut store = Self::from_points(points);
        log::warn!(
            "Excluded {} candidates without a size",
            rejected.len() - self.rejected.len()
        );
        store.rejected = rejected;
        Some(store)
    }

    /// Returns the `k` candidates closest to `origin`, closest first.
    ///
    /// Candidates are ranked by adjusted distance: `offset + euclidean`,
    /// or [`MIN_DISTANCE`] for a candidate at exactly the subject's
    /// position when `offset == 0`. Ties are broken by load order.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameterError`] as described on
    /// [`Self::validate_query`].
    pub fn nearest(
        &self,
        origin: Position,
        k: usize,
        offset: f64,
    ) -> Result<Vec<Neighbour<'_>>, InvalidParameterError> {
        self.validate_query(k, offset)?;

        let query = origin.as_array();
        let mut hits: Vec<(usize, f64)> = Vec::with_capacity(k + 1);
        let mut furthest = 0.0_f64;

        // Raw distances arrive ascending, so adjusted ones do too apart from
        // coincident candidates, which come first. Once k are held, stop at
        // the first entry beyond everything already collected.
        for (entry, distance_2) in self.tree.nearest_neighbor_iter_with_distance_2(&query) {
            let distance = adjusted_distance(distance_2.sqrt(), offset);
            if hits.len() >= k && distance > furthest {
                break;
            }
            furthest = furthest.max(distance);
            hits.push((entry.data, distance));
        }

        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(idx, distance)| Neighbour {
                point: &self.points[idx],
                distance,
            })
            .collect())
    }
}

/// Applies the offset and the coincident-location policy to a raw
/// Euclidean distance.
#[must_use]
pub fn adjusted_distance(raw: f64, offset: f64) -> f64 {
    if offset <= 0.0 && raw <= 0.0 {
        MIN_DISTANCE
    } else {
        offset + raw
    }
}
