//! Quantile-based inclusivity categories.

use school_gap_models::{InclusivityCategory, QuantileBreakpoints, ScoredSubject};

use crate::quantile::breakpoints;

/// Places `gap` into its inclusivity bucket.
///
/// Buckets are half-open on the upper side: a gap equal to a breakpoint
/// falls into the bucket that starts at that breakpoint.
#[must_use]
pub fn categorize(gap: f64, bp: &QuantileBreakpoints) -> InclusivityCategory {
    if gap < bp.q10 {
        InclusivityCategory::VeryInclusive
    } else if gap < bp.q25 {
        InclusivityCategory::MoreInclusiveThanMost
    } else if gap < bp.q75 {
        InclusivityCategory::BroadlyTypical
    } else if gap < bp.q90 {
        InclusivityCategory::LessInclusiveThanMost
    } else {
        InclusivityCategory::AmongTheLeastInclusive
    }
}

/// Computes breakpoints from the subjects' current gaps and labels every
/// subject with its category.
///
/// Returns `None` (leaving categories untouched) when there are no subjects.
pub fn assign_categories(subjects: &mut [ScoredSubject]) -> Option<QuantileBreakpoints> {
    let gaps: Vec<f64> = subjects.iter().map(|s| s.gap).collect();
    let bp = breakpoints(&gaps)?;

    for subject in subjects.iter_mut() {
        subject.category = Some(categorize(subject.gap, &bp));
    }

    Some(bp)
}
