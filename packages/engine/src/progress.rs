//! Scoring-run progress events.
//!
//! A run reports [`ProgressCallback::started`] once, then
//! [`ProgressCallback::subject_done`] for every subject (scored or
//! skipped), and ends with exactly one of [`ProgressCallback::finished`] or
//! [`ProgressCallback::abandoned`]. Every method defaults to a no-op.

use std::sync::Arc;

/// Receives progress events from [`crate::score`].
///
/// `subject_done` is called from rayon worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Scoring is about to start on `subjects` records.
    fn started(&self, subjects: u64) {
        let _ = subjects;
    }

    /// One subject has been scored or skipped.
    fn subject_done(&self) {}

    /// Every subject was processed: `scored` kept, `excluded` dropped.
    fn finished(&self, scored: u64, excluded: u64) {
        let _ = (scored, excluded);
    }

    /// The run stopped early (cancelled) and produced no output.
    fn abandoned(&self) {}
}

/// Ignores every progress event.
pub struct NullProgress;

impl ProgressCallback for NullProgress {}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
