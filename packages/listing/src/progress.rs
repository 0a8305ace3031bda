//! Progress reporting for scrapes.
//!
//! The pipeline reports stage messages ("fetching", "extracting") and a
//! page count through [`ProgressCallback`]. The CLI renders these as an
//! `indicatif` spinner; the dashboard and tests use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a running scrape.
///
/// Implementations must be `Send + Sync` so one callback can be shared
/// with spawned tasks via `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of pages to process, once known.
    fn set_total(&self, total: u64);

    /// Advances by `delta` pages.
    fn inc(&self, delta: u64);

    /// Replaces the stage message.
    fn set_message(&self, msg: String);

    /// Marks the scrape finished, leaving `msg` visible.
    fn finish(&self, msg: String);

    /// Marks the scrape finished and removes the indicator.
    fn finish_and_clear(&self);
}

/// A [`ProgressCallback`] that ignores everything.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
