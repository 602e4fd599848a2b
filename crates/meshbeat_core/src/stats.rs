//! Pipeline Counters
//!
//! Shared between the producer handle, both worker threads and the host.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters updated from the pipeline threads
#[derive(Debug, Default)]
pub struct PipelineStats {
    blocks_delivered: AtomicU64,
    blocks_analyzed: AtomicU64,
    overruns: AtomicU64,
    deadline_misses: AtomicU64,
    spectra_consumed: AtomicU64,
    events_emitted: AtomicU64,
    events_dropped: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub blocks_delivered: u64,
    pub blocks_analyzed: u64,
    pub overruns: u64,
    pub deadline_misses: u64,
    pub spectra_consumed: u64,
    pub events_emitted: u64,
    /// Events discarded because the host's event queue was full
    pub events_dropped: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    // Rust pattern: Relaxed ordering is fine for independent counters
    // that don't need to synchronize with other memory operations

    pub(crate) fn record_delivery(&self) {
        self.blocks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_analyzed(&self, blocks: u64) {
        self.blocks_analyzed.fetch_add(blocks, Ordering::Relaxed);
    }

    pub(crate) fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deadline_miss(&self) {
        self.deadline_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consumed(&self) {
        self.spectra_consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_events(&self, count: u64) {
        self.events_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_delivered: self.blocks_delivered.load(Ordering::Relaxed),
            blocks_analyzed: self.blocks_analyzed.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            deadline_misses: self.deadline_misses.load(Ordering::Relaxed),
            spectra_consumed: self.spectra_consumed.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}
