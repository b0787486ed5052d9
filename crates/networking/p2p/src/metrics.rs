//! Bootstrap health counters.
//!
//! Plain atomics; an exporter can scrape [`BootstrapMetrics::snapshot`]
//! whenever it likes.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct BootstrapMetrics {
    pub priority_requests: AtomicU64,
    pub database_requests: AtomicU64,
    pub dependency_requests: AtomicU64,
    pub frontier_requests: AtomicU64,
    pub send_failures: AtomicU64,
    pub responses: AtomicU64,
    pub untracked_responses: AtomicU64,
    pub timeouts: AtomicU64,
    pub invalid_responses: AtomicU64,
    pub empty_responses: AtomicU64,
    pub blocks_received: AtomicU64,
    pub frontiers_received: AtomicU64,
    pub dependency_syncs: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub priority_requests: u64,
    pub database_requests: u64,
    pub dependency_requests: u64,
    pub frontier_requests: u64,
    pub send_failures: u64,
    pub responses: u64,
    pub untracked_responses: u64,
    pub timeouts: u64,
    pub invalid_responses: u64,
    pub empty_responses: u64,
    pub blocks_received: u64,
    pub frontiers_received: u64,
    pub dependency_syncs: u64,
}

impl BootstrapMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            priority_requests: self.priority_requests.load(Ordering::Relaxed),
            database_requests: self.database_requests.load(Ordering::Relaxed),
            dependency_requests: self.dependency_requests.load(Ordering::Relaxed),
            frontier_requests: self.frontier_requests.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            untracked_responses: self.untracked_responses.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            invalid_responses: self.invalid_responses.load(Ordering::Relaxed),
            empty_responses: self.empty_responses.load(Ordering::Relaxed),
            blocks_received: self.blocks_received.load(Ordering::Relaxed),
            frontiers_received: self.frontiers_received.load(Ordering::Relaxed),
            dependency_syncs: self.dependency_syncs.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn bump_by(counter: &AtomicU64, amount: u64) {
    counter.fetch_add(amount, Ordering::Relaxed);
}
