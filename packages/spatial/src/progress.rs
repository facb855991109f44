//! Progress reporting for binning passes.
//!
//! Raster sources can produce millions of candidate points per run, so the
//! batch binning helpers report through [`ProgressCallback`]. Rendering is
//! chosen by the caller: an `indicatif` bar in the CLI, [`NullProgress`]
//! in tests and library use.

use std::sync::Arc;

/// Receives progress updates from a long-running pass.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
