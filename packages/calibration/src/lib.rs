#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Gap calibration and inclusivity categorisation.
//!
//! A run moves through two phases. [`GapSet`] holds the uncalibrated
//! scores exactly as the weighting engine produced them. Calling
//! [`GapSet::calibrate`] consumes it, subtracts the median gap from every
//! local estimate once, recomputes each gap, and yields a
//! [`CalibratedSet`]. Consuming the uncalibrated set is what keeps the
//! calibration one-shot.

pub mod category;
pub mod quantile;

pub use category::{assign_categories, categorize};
pub use quantile::{breakpoints, median, quantile};

use school_gap_models::{QuantileBreakpoints, ScoredSubject};

/// Default minimum number of scored subjects needed to calibrate.
pub const DEFAULT_MIN_SUBJECTS: usize = 1;

/// Errors that prevent the calibration phase from running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    /// Not enough scored subjects for a meaningful median.
    #[error("Calibration needs at least {required} scored subjects, got {scored}")]
    TooFewSubjects {
        /// Number of subjects that were scored.
        scored: usize,
        /// Configured minimum.
        required: usize,
    },

    /// A subject's gap is NaN or infinite.
    #[error("Subject {id} has a non-finite gap")]
    NonFiniteGap {
        /// Identifier of the offending subject.
        id: String,
    },
}

/// Scored subjects before calibration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapSet {
    subjects: Vec<ScoredSubject>,
}

impl GapSet {
    #[must_use]
    pub const fn new(subjects: Vec<ScoredSubject>) -> Self {
        Self { subjects }
    }

    #[must_use]
    pub fn subjects(&self) -> &[ScoredSubject] {
        &self.subjects
    }

    #[must_use]
    pub fn into_subjects(self) -> Vec<ScoredSubject> {
        self.subjects
    }

    /// Current gap values, in subject order.
    #[must_use]
    pub fn gaps(&self) -> Vec<f64> {
        self.subjects.iter().map(|s| s.gap).collect()
    }

    /// Labels subjects from the uncalibrated gap distribution.
    pub fn categorize(&mut self) -> Option<QuantileBreakpoints> {
        assign_categories(&mut self.subjects)
    }

    /// Subtracts the median gap from every local estimate and recomputes
    /// the gaps.
    ///
    /// # Errors
    ///
    /// On failure the untouched set is handed back alongside the
    /// [`CalibrationError`] so the caller can still emit uncalibrated
    /// output.
    pub fn calibrate(self, min_subjects: usize) -> Result<CalibratedSet, (CalibrationError, Self)> {
        let required = min_subjects.max(1);
        if self.subjects.len() < required {
            return Err((
                CalibrationError::TooFewSubjects {
                    scored: self.subjects.len(),
                    required,
                },
                self,
            ));
        }

        if let Some(bad) = self.subjects.iter().find(|s| !s.gap.is_finite()) {
            let id = bad.id.clone();
            return Err((CalibrationError::NonFiniteGap { id }, self));
        }

        let Some(median_gap) = median(&self.gaps()) else {
            return Err((
                CalibrationError::TooFewSubjects {
                    scored: 0,
                    required,
                },
                self,
            ));
        };

        log::info!("Median gap is {median_gap}; calibrating local estimates by this amount");

        let mut subjects = self.subjects;
        for subject in &mut subjects {
            subject.local_estimate -= median_gap;
            subject.gap = subject.local_estimate - subject.own_attribute;
        }

        let calibrated = CalibratedSet {
            subjects,
            median_offset: median_gap,
        };

        if let Some(after) = median(&calibrated.gaps()) {
            log::info!("Median gap after calibration is {after}");
        }

        Ok(calibrated)
    }
}

/// Scored subjects after the one-shot median calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedSet {
    subjects: Vec<ScoredSubject>,
    median_offset: f64,
}

impl CalibratedSet {
    #[must_use]
    pub fn subjects(&self) -> &[ScoredSubject] {
        &self.subjects
    }

    #[must_use]
    pub fn into_subjects(self) -> Vec<ScoredSubject> {
        self.subjects
    }

    /// The pre-calibration median that was subtracted.
    #[must_use]
    pub const fn median_offset(&self) -> f64 {
        self.median_offset
    }

    #[must_use]
    pub fn gaps(&self) -> Vec<f64> {
        self.subjects.iter().map(|s| s.gap).collect()
    }

    /// Labels subjects from the calibrated gap distribution.
    pub fn categorize(&mut self) -> Option<QuantileBreakpoints> {
        assign_categories(&mut self.subjects)
    }
}
