//! Run parameters and the presets used by the published analyses.
//!
//! [`GapParams`] is the complete parameter set for one run.
//! [`GapParamsOverrides`] is its partial, deserializable counterpart: a
//! TOML config file and command-line flags each produce one, and they are
//! layered onto a preset with [`GapParamsOverrides::apply`].

use school_gap_weighting::Weighting;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::EngineError;

// ── Policies ─────────────────────────────────────────────────────────────

/// What to do with a subject whose neighbour weights are degenerate.
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
pub enum FallbackPolicy {
    /// Use the nearest candidate's own target as the local estimate.
    #[default]
    NearestCandidate,
    /// Drop the subject and count it.
    Exclude,
}

/// Which gap distribution the final categories are derived from.
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
pub enum CategoryBasis {
    /// Breakpoints from the calibrated gaps.
    #[default]
    Calibrated,
    /// Breakpoints from the uncalibrated gaps, carried onto the calibrated
    /// records.
    Uncalibrated,
}

// ── Parameters ───────────────────────────────────────────────────────────

/// Parameters for one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapParams {
    /// Number of nearest candidates per subject.
    pub k: usize,
    /// Constant added to every raw distance, in metres.
    pub distance_offset: f64,
    pub weighting: Weighting,
    pub fallback: FallbackPolicy,
    pub category_basis: CategoryBasis,
    /// Minimum scored subjects required before calibrating.
    pub min_calibration_subjects: usize,
    /// Multiplier applied to the local estimate before the gap is taken,
    /// e.g. `100` to compare a `[0, 1]` rate against a percentage.
    pub target_scale: f64,
}

impl GapParams {
    /// Primary-school FSM estimate with a 1 km distance detuning.
    #[must_use]
    pub const fn primary_fsm() -> Self {
        Self {
            k: 18,
            distance_offset: 1000.0,
            weighting: Weighting::BySize,
            fallback: FallbackPolicy::NearestCandidate,
            category_basis: CategoryBasis::Calibrated,
            min_calibration_subjects: school_gap_calibration::DEFAULT_MIN_SUBJECTS,
            target_scale: 1.0,
        }
    }

    /// Primary-school FSM estimate with no detuning.
    #[must_use]
    pub const fn primary_fsm_basic() -> Self {
        Self {
            k: 12,
            distance_offset: 0.0,
            ..Self::primary_fsm()
        }
    }

    /// IDACI estimate from LSOA centroids, inverse-square weighted and
    /// scaled to a percentage.
    #[must_use]
    pub const fn deprivation_index() -> Self {
        Self {
            k: 20,
            distance_offset: 0.0,
            weighting: Weighting::InverseSquare,
            target_scale: 100.0,
            ..Self::primary_fsm()
        }
    }

    /// Checks the parameters that do not depend on the candidate store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTargetScale`] if `target_scale` is not
    /// a positive finite number.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.target_scale.is_finite() || self.target_scale <= 0.0 {
            return Err(EngineError::InvalidTargetScale(self.target_scale));
        }
        Ok(())
    }
}

impl Default for GapParams {
    fn default() -> Self {
        Self::primary_fsm()
    }
}

// ── Overrides ────────────────────────────────────────────────────────────

/// A partial [`GapParams`]; every field left unset keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GapParamsOverrides {
    pub k: Option<usize>,
    pub distance_offset: Option<f64>,
    pub weighting: Option<Weighting>,
    pub fallback: Option<FallbackPolicy>,
    pub category_basis: Option<CategoryBasis>,
    pub min_calibration_subjects: Option<usize>,
    pub target_scale: Option<f64>,
}

impl GapParamsOverrides {
    /// Layers these overrides onto `base`.
    #[must_use]
    pub fn apply(&self, base: GapParams) -> GapParams {
        GapParams {
            k: self.k.unwrap_or(base.k),
            distance_offset: self.distance_offset.unwrap_or(base.distance_offset),
            weighting: self.weighting.unwrap_or(base.weighting),
            fallback: self.fallback.unwrap_or(base.fallback),
            category_basis: self.category_basis.unwrap_or(base.category_basis),
            min_calibration_subjects: self
                .min_calibration_subjects
                .unwrap_or(base.min_calibration_subjects),
            target_scale: self.target_scale.unwrap_or(base.target_scale),
        }
    }

    /// Combines two override sets; fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            k: other.k.or(self.k),
            distance_offset: other.distance_offset.or(self.distance_offset),
            weighting: other.weighting.or(self.weighting),
            fallback: other.fallback.or(self.fallback),
            category_basis: other.category_basis.or(self.category_basis),
            min_calibration_subjects: other
                .min_calibration_subjects
                .or(self.min_calibration_subjects),
            target_scale: other.target_scale.or(self.target_scale),
        }
    }
}
