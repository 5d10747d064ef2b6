#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the school gap toolchain.
//!
//! Candidate points (primary schools or LSOA centroids) and query subjects
//! (secondary schools) arrive as loosely-typed records from the ingestion
//! layer and are validated into [`Point`] and [`Subject`]. The engine then
//! produces one [`ScoredSubject`] per subject, carrying the weighted
//! neighbour detail needed for auditing the estimate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Planar position in British National Grid metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Easting in metres.
    pub easting: f64,
    /// Northing in metres.
    pub northing: f64,
}

impl Position {
    #[must_use]
    pub const fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Raw Euclidean distance to `other`, before any offset is applied.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.easting - other.easting).hypot(self.northing - other.northing)
    }

    /// The `[easting, northing]` pair used as an R-tree coordinate.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 2] {
        [self.easting, self.northing]
    }
}

/// Errors raised while validating a raw record.
///
/// Fatal to the offending record only; loaders count and skip.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was absent.
    #[error("Record {record}: missing required field {field}")]
    Missing {
        /// Identifier of the offending record.
        record: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A numeric field held a non-numeric or non-finite value.
    #[error("Record {record}: field {field} is not numeric ({value})")]
    NonNumeric {
        /// Identifier of the offending record.
        record: String,
        /// Name of the offending field.
        field: &'static str,
        /// The raw value as seen by the loader.
        value: String,
    },

    /// A field that must be non-negative was negative.
    #[error("Record {record}: field {field} must be non-negative, got {value}")]
    Negative {
        /// Identifier of the offending record.
        record: String,
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

impl ValidationError {
    /// Identifier of the record that failed validation.
    #[must_use]
    pub fn record(&self) -> &str {
        match self {
            Self::Missing { record, .. }
            | Self::NonNumeric { record, .. }
            | Self::Negative { record, .. } => record,
        }
    }
}

/// Requires `value` to be present and finite.
///
/// # Errors
///
/// Returns [`ValidationError::Missing`] for `None` and
/// [`ValidationError::NonNumeric`] for NaN or infinite values.
pub fn require_finite(
    record: &str,
    field: &'static str,
    value: Option<f64>,
) -> Result<f64, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::Missing {
        record: record.to_string(),
        field,
    })?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonNumeric {
            record: record.to_string(),
            field,
            value: value.to_string(),
        })
    }
}

/// A candidate record as supplied by an ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    /// Stable source key (URN for schools, LSOA code for centroids).
    pub id: String,
    pub easting: Option<f64>,
    pub northing: Option<f64>,
    /// Size or cohort basis for weighting (pupil count).
    pub size: Option<f64>,
    /// Attribute being estimated (%FSM or deprivation rate).
    pub target: Option<f64>,
}

/// A validated candidate point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub id: String,
    pub position: Position,
    /// Non-negative size, absent for unsized candidates such as centroids.
    pub size: Option<f64>,
    pub target: f64,
}

/// Which optional fields a candidate must carry to be admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredFields {
    /// Reject candidates without a size.
    pub size: bool,
}

impl Point {
    /// Validates a raw candidate record.
    ///
    /// Position and target are always required. Size is required only
    /// when `required.size` is set, and must be non-negative when present.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] describing the first offending field.
    pub fn from_record(
        record: CandidateRecord,
        required: RequiredFields,
    ) -> Result<Self, ValidationError> {
        let easting = require_finite(&record.id, "easting", record.easting)?;
        let northing = require_finite(&record.id, "northing", record.northing)?;
        let target = require_finite(&record.id, "target", record.target)?;

        let size = match record.size {
            Some(size) if !size.is_finite() => {
                return Err(ValidationError::NonNumeric {
                    record: record.id,
                    field: "size",
                    value: size.to_string(),
                });
            }
            Some(size) if size < 0.0 => {
                return Err(ValidationError::Negative {
                    record: record.id,
                    field: "size",
                    value: size,
                });
            }
            None if required.size => {
                return Err(ValidationError::Missing {
                    record: record.id,
                    field: "size",
                });
            }
            size => size,
        };

        Ok(Self {
            id: record.id,
            position: Position::new(easting, northing),
            size,
            target,
        })
    }
}

/// A subject record as supplied by an ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub id: String,
    pub easting: Option<f64>,
    pub northing: Option<f64>,
    /// The subject's own value of the compared attribute (%FSM).
    pub own_attribute: Option<f64>,
    /// Explanatory fields carried through to the output untouched.
    pub passthrough: BTreeMap<String, String>,
}

/// A validated query subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub position: Position,
    pub own_attribute: f64,
    pub passthrough: BTreeMap<String, String>,
}

impl TryFrom<SubjectRecord> for Subject {
    type Error = ValidationError;

    fn try_from(record: SubjectRecord) -> Result<Self, Self::Error> {
        let easting = require_finite(&record.id, "easting", record.easting)?;
        let northing = require_finite(&record.id, "northing", record.northing)?;
        let own_attribute = require_finite(&record.id, "ownAttribute", record.own_attribute)?;

        Ok(Self {
            id: record.id,
            position: Position::new(easting, northing),
            own_attribute,
            passthrough: record.passthrough,
        })
    }
}

/// One entry of a per-query neighbour set: a borrowed candidate and its
/// adjusted distance (offset and zero-distance policy already applied).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour<'a> {
    pub point: &'a Point,
    pub distance: f64,
}

/// A selected neighbour with its normalised weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedNeighbour {
    pub id: String,
    /// Adjusted distance used for weighting.
    pub distance: f64,
    pub size: Option<f64>,
    pub target: f64,
    /// Normalised weight in `[0, 1]`; a neighbour set sums to 1.
    pub weight: f64,
}

/// How a subject's local estimate was obtained.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EstimateSource {
    /// Normalised weighted sum over the k nearest candidates.
    Weighted,
    /// Degenerate weights; the nearest candidate's own target was used.
    NearestFallback,
}

/// Relative inclusivity label derived from the gap distribution.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum InclusivityCategory {
    /// Gap below the 10th percentile.
    #[serde(rename = "very inclusive")]
    #[strum(serialize = "very inclusive")]
    VeryInclusive,
    /// Gap in `[q10, q25)`.
    #[serde(rename = "more inclusive than most")]
    #[strum(serialize = "more inclusive than most")]
    MoreInclusiveThanMost,
    /// Gap in `[q25, q75)`.
    #[serde(rename = "broadly typical")]
    #[strum(serialize = "broadly typical")]
    BroadlyTypical,
    /// Gap in `[q75, q90)`.
    #[serde(rename = "less inclusive than most")]
    #[strum(serialize = "less inclusive than most")]
    LessInclusiveThanMost,
    /// Gap at or above the 90th percentile.
    #[serde(rename = "among the least inclusive")]
    #[strum(serialize = "among the least inclusive")]
    AmongTheLeastInclusive,
}

impl InclusivityCategory {
    /// All categories, most inclusive first.
    pub const ALL: [Self; 5] = [
        Self::VeryInclusive,
        Self::MoreInclusiveThanMost,
        Self::BroadlyTypical,
        Self::LessInclusiveThanMost,
        Self::AmongTheLeastInclusive,
    ];
}

/// Quantile breakpoints of a gap distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantileBreakpoints {
    pub q10: f64,
    pub q25: f64,
    /// Median.
    pub q50: f64,
    pub q75: f64,
    pub q90: f64,
}

/// A subject with its local estimate, gap and (once categorised) label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSubject {
    pub id: String,
    pub position: Position,
    pub own_attribute: f64,
    pub local_estimate: f64,
    /// `local_estimate - own_attribute`; positive means the subject is
    /// less disadvantaged than its neighbourhood.
    pub gap: f64,
    pub category: Option<InclusivityCategory>,
    pub estimate_source: EstimateSource,
    /// Selected neighbours, closest first.
    pub neighbours: Vec<WeightedNeighbour>,
    pub passthrough: BTreeMap<String, String>,
}

/// Per-subject failure counts collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSummary {
    /// Candidate records rejected while loading the store.
    pub candidates_rejected: u64,
    /// Subjects excluded because a required field was missing or invalid.
    pub validation: u64,
    /// Subjects whose weights were degenerate and received the fallback.
    pub degenerate_fallback: u64,
    /// Subjects whose weights were degenerate and were excluded.
    pub degenerate_excluded: u64,
    /// Set when calibration could not run and output is uncalibrated.
    pub calibration_skipped: bool,
}

impl FailureSummary {
    /// Number of subjects missing from the output.
    #[must_use]
    pub const fn excluded(&self) -> u64 {
        self.validation + self.degenerate_excluded
    }
}
