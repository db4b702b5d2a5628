use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default, Debug)]
pub struct PipelineStats {
    pub processed: Arc<AtomicU64>,
    pub bootstrapped: Arc<AtomicU64>,
    pub zero_weight: Arc<AtomicU64>,

    // failure reasons
    pub failed_fatal: Arc<AtomicU64>,
    pub failed_retryable: Arc<AtomicU64>,
}

impl PipelineStats {
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
