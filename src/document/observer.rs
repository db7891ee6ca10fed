//! Progress reporting hooks for the structuring pipeline

use tracing::{debug, info, warn};

use crate::document::extractor::NumberingViolation;

/// Receives structuring progress; every method defaults to a no-op
pub trait ProgressObserver: Send + Sync {
    fn on_pages(&self, _total: usize) {}
    fn on_page(&self, _done: usize, _total: usize) {}
    fn on_requirement(&self, _number: &str, _title: &str) {}
    fn on_violation(&self, _violation: &NumberingViolation) {}
    fn on_finished(&self, _requirements: usize, _chunks: usize) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Observer that forwards progress to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_pages(&self, total: usize) {
        info!(pages = total, "processing source pages");
    }

    fn on_page(&self, done: usize, total: usize) {
        if done % 5 == 0 || done == total {
            debug!(done, total, "pages processed");
        }
    }

    fn on_requirement(&self, number: &str, title: &str) {
        debug!(number, title, "found requirement");
    }

    fn on_violation(&self, violation: &NumberingViolation) {
        warn!(
            kind = ?violation.kind,
            number = %violation.number,
            absorbed_by = %violation.absorbed_by,
            "numbering violation absorbed into content"
        );
    }

    fn on_finished(&self, requirements: usize, chunks: usize) {
        info!(requirements, chunks, "document structured");
    }
}
