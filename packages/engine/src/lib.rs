#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Orchestrates a full school gap run.
//!
//! A run validates its parameters against the candidate store, scores
//! every subject in parallel (nearest-k selection, weight normalisation,
//! aggregation), then passes the complete uncalibrated set through the
//! one-shot median calibration and categorisation. Per-subject failures
//! are counted and never abort the batch; parameter errors abort before
//! any subject is scored.
//!
//! Progress is emitted through [`ProgressCallback`] and the per-subject
//! loop honours a [`CancellationToken`].

pub mod cancel;
pub mod diagnostics;
pub mod params;
pub mod progress;
pub mod run;

pub use cancel::CancellationToken;
pub use diagnostics::{SweepRow, sweep_k, weight_rank_profile};
pub use params::{CategoryBasis, FallbackPolicy, GapParams, GapParamsOverrides};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use run::{GapRun, RunStatistics, ScoredRun, SubjectFailure, run, score};

use school_gap_spatial::InvalidParameterError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `k`, the distance offset, or the candidate set is unusable.
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),

    /// The target scale must be a positive finite number.
    #[error("Target scale must be positive and finite, got {0}")]
    InvalidTargetScale(f64),

    /// The run was cancelled before every subject was scored.
    #[error("Run cancelled")]
    Cancelled,
}
