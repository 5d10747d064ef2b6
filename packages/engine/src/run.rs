//! The scoring run: parallel per-subject scoring followed by calibration.
//!
//! [`score`] produces a [`ScoredRun`] holding the uncalibrated gaps, which
//! callers may persist before calling [`ScoredRun::calibrate`]. [`run`]
//! does both in one call.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use school_gap_calibration::{CalibrationError, GapSet};
use school_gap_models::{
    EstimateSource, FailureSummary, InclusivityCategory, QuantileBreakpoints, ScoredSubject,
    Subject, SubjectRecord, ValidationError,
};
use school_gap_spatial::GeoPointStore;
use school_gap_weighting::{
    DegenerateInputError, Weighting, aggregate, nearest_fallback, normalize,
};
use serde::Serialize;

use crate::params::{FallbackPolicy, GapParams};
use crate::{CancellationToken, EngineError, ProgressCallback};

/// Why a subject is missing from the output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubjectFailure {
    /// A required field was missing or invalid.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The neighbour weights were degenerate and no fallback applied.
    #[error("Subject {id}: {source}")]
    Degenerate {
        id: String,
        source: DegenerateInputError,
    },
}

enum Outcome {
    Scored(ScoredSubject),
    Failed(SubjectFailure),
}

/// Output of the uncalibrated phase.
#[derive(Debug, Clone)]
pub struct ScoredRun {
    set: GapSet,
    breakpoints: Option<QuantileBreakpoints>,
    failures: FailureSummary,
    skipped: Vec<SubjectFailure>,
}

impl ScoredRun {
    /// Uncalibrated scored subjects, categorised against their own gaps.
    #[must_use]
    pub fn subjects(&self) -> &[ScoredSubject] {
        self.set.subjects()
    }

    #[must_use]
    pub const fn breakpoints(&self) -> Option<&QuantileBreakpoints> {
        self.breakpoints.as_ref()
    }

    #[must_use]
    pub const fn failures(&self) -> &FailureSummary {
        &self.failures
    }

    #[must_use]
    pub fn skipped(&self) -> &[SubjectFailure] {
        &self.skipped
    }

    /// Runs the one-shot median calibration and final categorisation.
    ///
    /// Calibration failure is not an error: the run keeps its uncalibrated
    /// output and records why calibration was skipped.
    #[must_use]
    pub fn calibrate(self, params: &GapParams) -> GapRun {
        let Self {
            set,
            breakpoints: uncalibrated_breakpoints,
            mut failures,
            skipped,
        } = self;
        let uncalibrated = set.subjects().to_vec();

        match set.calibrate(params.min_calibration_subjects) {
            Ok(mut calibrated) => {
                // Categories from the uncalibrated pass are already on each
                // record; only recompute them for the calibrated basis.
                let breakpoints = match params.category_basis {
                    crate::CategoryBasis::Calibrated => calibrated.categorize(),
                    crate::CategoryBasis::Uncalibrated => uncalibrated_breakpoints,
                };
                let median_offset = calibrated.median_offset();

                GapRun {
                    uncalibrated,
                    calibrated: Some(calibrated.into_subjects()),
                    uncalibrated_breakpoints,
                    breakpoints,
                    median_offset: Some(median_offset),
                    calibration_error: None,
                    failures,
                    skipped,
                }
            }
            Err((e, _)) => {
                log::warn!("Calibration skipped, output is uncalibrated: {e}");
                failures.calibration_skipped = true;

                GapRun {
                    uncalibrated,
                    calibrated: None,
                    uncalibrated_breakpoints,
                    breakpoints: uncalibrated_breakpoints,
                    median_offset: None,
                    calibration_error: Some(e),
                    failures,
                    skipped,
                }
            }
        }
    }
}

/// Complete result of a run.
#[derive(Debug, Clone)]
pub struct GapRun {
    /// Scores before calibration, with neighbour detail.
    pub uncalibrated: Vec<ScoredSubject>,
    /// Scores after calibration; `None` when calibration was skipped.
    pub calibrated: Option<Vec<ScoredSubject>>,
    pub uncalibrated_breakpoints: Option<QuantileBreakpoints>,
    /// Breakpoints behind the final categories.
    pub breakpoints: Option<QuantileBreakpoints>,
    /// Median gap subtracted during calibration.
    pub median_offset: Option<f64>,
    pub calibration_error: Option<CalibrationError>,
    pub failures: FailureSummary,
    pub skipped: Vec<SubjectFailure>,
}

impl GapRun {
    /// The final records: calibrated when available.
    #[must_use]
    pub fn scored(&self) -> &[ScoredSubject] {
        self.calibrated.as_deref().unwrap_or(&self.uncalibrated)
    }

    #[must_use]
    pub fn statistics(&self) -> RunStatistics {
        let mut category_counts = BTreeMap::new();
        for subject in self.scored() {
            if let Some(category) = subject.category {
                *category_counts.entry(category).or_insert(0) += 1;
            }
        }

        RunStatistics {
            subjects: self.scored().len(),
            calibrated: self.calibrated.is_some(),
            median_offset: self.median_offset,
            breakpoints: self.breakpoints,
            uncalibrated_breakpoints: self.uncalibrated_breakpoints,
            category_counts,
            failures: self.failures.clone(),
        }
    }
}

/// Aggregate figures reported alongside the scored output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub subjects: usize,
    pub calibrated: bool,
    pub median_offset: Option<f64>,
    pub breakpoints: Option<QuantileBreakpoints>,
    pub uncalibrated_breakpoints: Option<QuantileBreakpoints>,
    pub category_counts: BTreeMap<InclusivityCategory, u64>,
    pub failures: FailureSummary,
}

/// Scores and calibrates every subject.
///
/// # Errors
///
/// See [`score`].
pub fn run(
    store: &GeoPointStore,
    subjects: Vec<SubjectRecord>,
    params: &GapParams,
    progress: &Arc<dyn ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<GapRun, EngineError> {
    Ok(score(store, subjects, params, progress, cancel)?.calibrate(params))
}

/// Scores every subject against `store` without calibrating.
///
/// Subjects are scored in parallel; output order matches input order.
/// Under [`Weighting::BySize`], candidates without a size are excluded and
/// counted in [`FailureSummary::candidates_rejected`].
///
/// # Errors
///
/// * [`EngineError::InvalidParameter`] or
///   [`EngineError::InvalidTargetScale`] for unusable parameters, before
///   any subject is scored
/// * [`EngineError::Cancelled`] if `cancel` fires during the run
pub fn score(
    store: &GeoPointStore,
    subjects: Vec<SubjectRecord>,
    params: &GapParams,
    progress: &Arc<dyn ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<ScoredRun, EngineError> {
    params.validate()?;
    let sized = match params.weighting {
        Weighting::BySize => store.sized_only(),
        Weighting::InverseSquare => None,
    };
    let store = sized.as_ref().unwrap_or(store);
    store.validate_query(params.k, params.distance_offset)?;

    log::info!(
        "Scoring {} subjects against {} candidates (k = {}, offset = {} m, {} weighting)",
        subjects.len(),
        store.len(),
        params.k,
        params.distance_offset,
        params.weighting,
    );

    progress.started(subjects.len() as u64);

    let outcomes = subjects
        .into_par_iter()
        .map(|record| {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let outcome = score_subject(store, record, params);
            progress.subject_done();
            outcome
        })
        .collect::<Result<Vec<_>, _>>();

    let outcomes = match outcomes {
        Ok(outcomes) => outcomes,
        Err(e) => {
            progress.abandoned();
            return Err(e);
        }
    };

    let mut failures = FailureSummary {
        candidates_rejected: store.rejected().len() as u64,
        ..FailureSummary::default()
    };
    let mut scored = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();

    for outcome in outcomes {
        match outcome {
            Outcome::Scored(subject) => {
                if subject.estimate_source == EstimateSource::NearestFallback {
                    failures.degenerate_fallback += 1;
                }
                scored.push(subject);
            }
            Outcome::Failed(failure) => {
                log::debug!("Skipping subject: {failure}");
                match failure {
                    SubjectFailure::Invalid(_) => failures.validation += 1,
                    SubjectFailure::Degenerate { .. } => failures.degenerate_excluded += 1,
                }
                skipped.push(failure);
            }
        }
    }

    progress.finished(scored.len() as u64, failures.excluded());
    log::info!(
        "Scored {} subjects ({} by nearest-candidate fallback, {} excluded)",
        scored.len(),
        failures.degenerate_fallback,
        failures.excluded(),
    );
    if failures.excluded() > 0 {
        log::warn!(
            "{} subjects excluded: {} invalid, {} with degenerate weights",
            failures.excluded(),
            failures.validation,
            failures.degenerate_excluded,
        );
    }

    let mut set = GapSet::new(scored);
    let breakpoints = set.categorize();

    Ok(ScoredRun {
        set,
        breakpoints,
        failures,
        skipped,
    })
}

fn score_subject(
    store: &GeoPointStore,
    record: SubjectRecord,
    params: &GapParams,
) -> Result<Outcome, EngineError> {
    let subject = match Subject::try_from(record) {
        Ok(subject) => subject,
        Err(e) => return Ok(Outcome::Failed(e.into())),
    };

    let selected = store.nearest(subject.position, params.k, params.distance_offset)?;

    let (estimate, neighbours, estimate_source) = match normalize(&selected, params.weighting) {
        Ok(weighted) => (aggregate(&weighted), weighted, EstimateSource::Weighted),
        Err(source) => {
            let fallback = match params.fallback {
                FallbackPolicy::NearestCandidate => nearest_fallback(&selected),
                FallbackPolicy::Exclude => None,
            };
            let Some((estimate, detail)) = fallback else {
                return Ok(Outcome::Failed(SubjectFailure::Degenerate {
                    id: subject.id,
                    source,
                }));
            };
            log::debug!(
                "Subject {}: {source}; using nearest candidate's target",
                subject.id
            );
            (estimate, detail, EstimateSource::NearestFallback)
        }
    };

    let local_estimate = estimate * params.target_scale;

    Ok(Outcome::Scored(ScoredSubject {
        id: subject.id,
        position: subject.position,
        own_attribute: subject.own_attribute,
        local_estimate,
        gap: local_estimate - subject.own_attribute,
        category: None,
        estimate_source,
        neighbours,
        passthrough: subject.passthrough,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use school_gap_calibration::median;
    use school_gap_models::{Point, Position};
    use school_gap_spatial::{InvalidParameterError, MIN_DISTANCE};

    use super::*;
    use crate::{CategoryBasis, null_progress};

    #[derive(Default)]
    struct CountingProgress {
        total: AtomicU64,
        done: AtomicU64,
        finished: AtomicU64,
        abandoned: AtomicU64,
    }

    impl ProgressCallback for CountingProgress {
        fn started(&self, subjects: u64) {
            self.total.store(subjects, Ordering::SeqCst);
        }
        fn subject_done(&self) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
        fn finished(&self, scored: u64, excluded: u64) {
            assert_eq!(scored + excluded, self.total.load(Ordering::SeqCst));
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
        fn abandoned(&self) {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn candidate(id: &str, easting: f64, northing: f64, size: f64, target: f64) -> Point {
        Point {
            id: id.to_string(),
            position: Position::new(easting, northing),
            size: Some(size),
            target,
        }
    }

    fn subject(id: &str, easting: f64, northing: f64, own: Option<f64>) -> SubjectRecord {
        SubjectRecord {
            id: id.to_string(),
            easting: Some(easting),
            northing: Some(northing),
            own_attribute: own,
            passthrough: BTreeMap::new(),
        }
    }

    fn basic(k: usize) -> GapParams {
        GapParams {
            k,
            ..GapParams::primary_fsm_basic()
        }
    }

    fn run_default(
        store: &GeoPointStore,
        subjects: Vec<SubjectRecord>,
        params: &GapParams,
    ) -> Result<GapRun, EngineError> {
        run(
            store,
            subjects,
            params,
            &null_progress(),
            &CancellationToken::new(),
        )
    }

    fn three_point_store() -> GeoPointStore {
        GeoPointStore::from_points(vec![
            candidate("near", 1.0, 0.0, 100.0, 10.0),
            candidate("mid", 0.0, 2.0, 100.0, 20.0),
            candidate("far", 100.0, 0.0, 100.0, 90.0),
        ])
    }

    fn town_store() -> GeoPointStore {
        let mut points = Vec::new();
        for i in 0..12_u32 {
            for j in 0..12_u32 {
                let size = f64::from(150 + (i * 37 + j * 11) % 300);
                let target = f64::from((i * 7 + j * 13) % 45) + 2.0;
                points.push(candidate(
                    &format!("{i}-{j}"),
                    f64::from(i) * 800.0,
                    f64::from(j) * 650.0,
                    size,
                    target,
                ));
            }
        }
        GeoPointStore::from_points(points)
    }

    fn town_subjects(n: u32) -> Vec<SubjectRecord> {
        (0..n)
            .map(|i| {
                subject(
                    &format!("S{i}"),
                    f64::from(i * 263 % 9000),
                    f64::from(i * 421 % 7000),
                    Some(f64::from(i * 17 % 40) + 1.0),
                )
            })
            .collect()
    }

    #[test]
    fn end_to_end_two_nearest() {
        let store = three_point_store();
        let gap_run =
            run_default(&store, vec![subject("sec", 0.0, 0.0, Some(7.0))], &basic(2)).unwrap();

        let scored = &gap_run.uncalibrated[0];
        let ids: Vec<&str> = scored.neighbours.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!((scored.neighbours[0].weight - 0.8).abs() < 1e-12);
        assert!((scored.neighbours[1].weight - 0.2).abs() < 1e-12);
        assert!((scored.local_estimate - 12.0).abs() < 1e-12);
        assert!((scored.gap - 5.0).abs() < 1e-12);
        assert_eq!(scored.estimate_source, EstimateSource::Weighted);

        // A single subject calibrates to exactly zero.
        let calibrated = gap_run.calibrated.as_ref().unwrap();
        assert_eq!(calibrated[0].gap, 0.0);
        assert!((gap_run.median_offset.unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_size_candidate_gets_zero_weight() {
        let store = GeoPointStore::from_points(vec![
            candidate("empty", 1.0, 0.0, 0.0, 80.0),
            candidate("full", 0.0, 3.0, 200.0, 15.0),
        ]);
        let gap_run =
            run_default(&store, vec![subject("sec", 0.0, 0.0, Some(10.0))], &basic(2)).unwrap();
        let scored = &gap_run.uncalibrated[0];
        assert!(scored.neighbours[0].weight.abs() < f64::EPSILON);
        assert!((scored.local_estimate - 15.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_subject_uses_min_distance() {
        let store = three_point_store();
        let gap_run =
            run_default(&store, vec![subject("sec", 1.0, 0.0, Some(7.0))], &basic(3)).unwrap();
        let neighbours = &gap_run.uncalibrated[0].neighbours;
        let ids: Vec<&str> = neighbours.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["mid", "far", "near"]);
        assert!((neighbours[2].distance - MIN_DISTANCE).abs() < f64::EPSILON);
        assert!(gap_run.uncalibrated[0].local_estimate.is_finite());
    }

    #[test]
    fn invalid_subjects_are_counted_not_fatal() {
        let store = three_point_store();
        let mut missing_position = subject("no-position", 0.0, 0.0, Some(3.0));
        missing_position.easting = None;
        let subjects = vec![
            subject("ok", 0.0, 0.0, Some(7.0)),
            subject("no-fsm", 0.0, 0.0, None),
            missing_position,
        ];

        let gap_run = run_default(&store, subjects, &basic(2)).unwrap();
        assert_eq!(gap_run.scored().len(), 1);
        assert_eq!(gap_run.failures.validation, 2);
        assert_eq!(gap_run.failures.excluded(), 2);
        assert_eq!(gap_run.skipped.len(), 2);
        assert!(
            gap_run
                .skipped
                .iter()
                .all(|f| matches!(f, SubjectFailure::Invalid(_)))
        );
    }

    #[test]
    fn degenerate_weights_use_fallback_or_exclude() {
        let store = GeoPointStore::from_points(vec![
            candidate("a", 10.0, 0.0, 0.0, 33.0),
            candidate("b", 50.0, 0.0, 0.0, 20.0),
        ]);
        let subjects = vec![subject("sec", 0.0, 0.0, Some(30.0))];

        let gap_run = run_default(&store, subjects.clone(), &basic(2)).unwrap();
        let scored = &gap_run.uncalibrated[0];
        assert_eq!(scored.estimate_source, EstimateSource::NearestFallback);
        assert!((scored.local_estimate - 33.0).abs() < f64::EPSILON);
        assert_eq!(gap_run.failures.degenerate_fallback, 1);

        let exclude = GapParams {
            fallback: FallbackPolicy::Exclude,
            ..basic(2)
        };
        let gap_run = run_default(&store, subjects, &exclude).unwrap();
        assert!(gap_run.uncalibrated.is_empty());
        assert_eq!(gap_run.failures.degenerate_excluded, 1);
        assert!(matches!(
            gap_run.skipped[0],
            SubjectFailure::Degenerate {
                source: DegenerateInputError::ZeroWeightSum,
                ..
            }
        ));
        assert!(gap_run.failures.calibration_skipped);
        assert!(gap_run.calibrated.is_none());
    }

    #[test]
    fn invalid_k_aborts_before_scoring() {
        let store = three_point_store();
        let counter = Arc::new(CountingProgress::default());
        let progress: Arc<dyn ProgressCallback> = counter.clone();

        let err = run(
            &store,
            vec![subject("sec", 0.0, 0.0, Some(7.0))],
            &basic(4),
            &progress,
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidParameter(InvalidParameterError::KOutOfRange { k: 4, available: 3 })
        ));
        assert_eq!(counter.total.load(Ordering::SeqCst), 0);
        assert_eq!(counter.done.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_store_aborts() {
        let store = GeoPointStore::from_points(Vec::new());
        let err = run_default(&store, town_subjects(3), &basic(1)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidParameter(InvalidParameterError::EmptyCandidateSet)
        ));
    }

    #[test]
    fn unsized_candidates_are_excluded_under_size_weighting() {
        let mut centroid = candidate("centroid", 0.5, 0.0, 1.0, 99.0);
        centroid.size = None;
        let store = GeoPointStore::from_points(vec![
            centroid,
            candidate("near", 1.0, 0.0, 100.0, 10.0),
            candidate("mid", 0.0, 2.0, 100.0, 20.0),
        ]);

        let gap_run =
            run_default(&store, vec![subject("sec", 0.0, 0.0, Some(7.0))], &basic(2)).unwrap();
        let scored = &gap_run.uncalibrated[0];
        let ids: Vec<&str> = scored.neighbours.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!((scored.local_estimate - 12.0).abs() < 1e-12);
        assert_eq!(gap_run.failures.candidates_rejected, 1);

        // The same store keeps the centroid for plain inverse-square weighting.
        let params = GapParams {
            k: 1,
            ..GapParams::deprivation_index()
        };
        let gap_run = run_default(&store, vec![subject("sec", 0.0, 0.0, Some(7.0))], &params).unwrap();
        assert_eq!(gap_run.uncalibrated[0].neighbours[0].id, "centroid");
        assert!((gap_run.uncalibrated[0].local_estimate - 9900.0).abs() < 1e-9);
        assert_eq!(gap_run.failures.candidates_rejected, 0);
    }

    #[test]
    fn all_unsized_candidates_leave_an_empty_set() {
        let mut centroid = candidate("centroid", 0.0, 0.0, 1.0, 0.3);
        centroid.size = None;
        let store = GeoPointStore::from_points(vec![centroid]);

        let err = run_default(&store, town_subjects(1), &basic(1)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidParameter(InvalidParameterError::EmptyCandidateSet)
        ));

        let params = GapParams {
            k: 1,
            ..GapParams::deprivation_index()
        };
        let gap_run = run_default(&store, town_subjects(1), &params).unwrap();
        assert!((gap_run.uncalibrated[0].local_estimate - 30.0).abs() < 1e-9);
    }

    #[test]
    fn cancelled_run_returns_no_data() {
        let store = town_store();
        let token = CancellationToken::new();
        token.cancel();
        let counter = Arc::new(CountingProgress::default());
        let progress: Arc<dyn ProgressCallback> = counter.clone();

        let err = run(
            &store,
            town_subjects(50),
            &GapParams::primary_fsm(),
            &progress,
            &token,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(counter.abandoned.load(Ordering::SeqCst), 1);
        assert_eq!(counter.finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn progress_counts_every_subject() {
        let store = town_store();
        let counter = Arc::new(CountingProgress::default());
        let progress: Arc<dyn ProgressCallback> = counter.clone();

        run(
            &store,
            town_subjects(120),
            &GapParams::primary_fsm(),
            &progress,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(counter.total.load(Ordering::SeqCst), 120);
        assert_eq!(counter.done.load(Ordering::SeqCst), 120);
        assert_eq!(counter.finished.load(Ordering::SeqCst), 1);
        assert_eq!(counter.abandoned.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parallel_output_keeps_input_order_and_unit_weights() {
        let store = town_store();
        let subjects = town_subjects(200);
        let expected: Vec<String> = subjects.iter().map(|s| s.id.clone()).collect();

        let gap_run = run_default(&store, subjects, &GapParams::primary_fsm()).unwrap();
        let ids: Vec<String> = gap_run.uncalibrated.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, expected);

        for scored in &gap_run.uncalibrated {
            assert_eq!(scored.neighbours.len(), 18);
            let sum: f64 = scored.neighbours.iter().map(|n| n.weight).sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(scored.neighbours.iter().all(|n| n.distance >= 1000.0));
        }
    }

    #[test]
    fn calibrated_median_is_zero_and_categories_assigned() {
        let store = town_store();
        let gap_run = run_default(&store, town_subjects(301), &GapParams::primary_fsm()).unwrap();

        let calibrated = gap_run.calibrated.as_ref().unwrap();
        let gaps: Vec<f64> = calibrated.iter().map(|s| s.gap).collect();
        assert!(median(&gaps).unwrap().abs() < 1e-6);
        assert!(calibrated.iter().all(|s| s.category.is_some()));

        let stats = gap_run.statistics();
        assert_eq!(stats.subjects, 301);
        assert!(stats.calibrated);
        assert_eq!(stats.category_counts.values().sum::<u64>(), 301);
        assert!(stats.breakpoints.unwrap().q50.abs() < 1e-6);
    }

    #[test]
    fn category_basis_does_not_change_labels() {
        let store = town_store();
        let calibrated_basis = run_default(&store, town_subjects(150), &GapParams::primary_fsm())
            .unwrap();
        let uncalibrated_basis = run_default(
            &store,
            town_subjects(150),
            &GapParams {
                category_basis: CategoryBasis::Uncalibrated,
                ..GapParams::primary_fsm()
            },
        )
        .unwrap();

        let a: Vec<_> = calibrated_basis.scored().iter().map(|s| s.category).collect();
        let b: Vec<_> = uncalibrated_basis.scored().iter().map(|s| s.category).collect();
        assert_eq!(a, b);
        assert_eq!(
            uncalibrated_basis.breakpoints,
            uncalibrated_basis.uncalibrated_breakpoints
        );
    }

    #[test]
    fn too_few_subjects_skips_calibration() {
        let store = three_point_store();
        let params = GapParams {
            min_calibration_subjects: 2,
            ..basic(2)
        };
        let gap_run =
            run_default(&store, vec![subject("sec", 0.0, 0.0, Some(7.0))], &params).unwrap();

        assert!(gap_run.calibrated.is_none());
        assert!(gap_run.failures.calibration_skipped);
        assert!(matches!(
            gap_run.calibration_error,
            Some(CalibrationError::TooFewSubjects {
                scored: 1,
                required: 2
            })
        ));
        assert!((gap_run.scored()[0].gap - 5.0).abs() < 1e-12);
    }

    #[test]
    fn rejected_candidates_are_reported() {
        use school_gap_models::{CandidateRecord, RequiredFields};

        let store = GeoPointStore::load(
            vec![
                CandidateRecord {
                    id: "ok".to_string(),
                    easting: Some(0.0),
                    northing: Some(0.0),
                    size: Some(10.0),
                    target: Some(5.0),
                },
                CandidateRecord {
                    id: "no-fsm".to_string(),
                    easting: Some(0.0),
                    northing: Some(0.0),
                    size: Some(10.0),
                    target: None,
                },
            ],
            RequiredFields { size: true },
        );
        let gap_run = run_default(&store, town_subjects(2), &basic(1)).unwrap();
        assert_eq!(gap_run.failures.candidates_rejected, 1);
    }
}
