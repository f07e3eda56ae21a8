// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Passive pager counters.
//!
//! Counters are relaxed atomics so a snapshot can be taken from any
//! context without entering the pager's mutual-exclusion domain; the
//! values may be stale by the time the caller reads them.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time copy of the pager counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Faults resolved against a frame that was still resident (hidden
    /// or released-and-reused).
    pub hidden_hits: usize,
    /// Verified loads from the backing store.
    pub ro_hits: usize,
    /// Fresh zero-filled read-write pages.
    pub rw_hits: usize,
    /// Zero-initialized pages released back to the pool.
    pub zi_released: usize,
    /// Frames currently backing real pages (includes hidden frames).
    pub npages: usize,
    /// Total frames donated to the pool.
    pub npages_all: usize,
}

/// Shared counter block, incremented only by the fault and release paths.
#[derive(Debug, Default)]
pub struct PagerStats {
    hidden_hits: AtomicUsize,
    ro_hits: AtomicUsize,
    rw_hits: AtomicUsize,
    zi_released: AtomicUsize,
    npages: AtomicUsize,
    npages_all: AtomicUsize,
}

impl PagerStats {
    pub const fn new() -> Self {
        Self {
            hidden_hits: AtomicUsize::new(0),
            ro_hits: AtomicUsize::new(0),
            rw_hits: AtomicUsize::new(0),
            zi_released: AtomicUsize::new(0),
            npages: AtomicUsize::new(0),
            npages_all: AtomicUsize::new(0),
        }
    }

    pub fn hidden_hit(&self) {
        self.hidden_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ro_hit(&self) {
        self.ro_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rw_hit(&self) {
        self.rw_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn zi_released(&self, pages: usize) {
        self.zi_released.fetch_add(pages, Ordering::Relaxed);
    }

    pub fn frame_donated(&self) {
        self.npages_all.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resident_inc(&self) {
        self.npages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resident_dec(&self) {
        self.npages.fetch_sub(1, Ordering::Relaxed);
    }

    /// Copies all counters into a [`Stats`] value.
    pub fn snapshot(&self) -> Stats {
        Stats {
            hidden_hits: self.hidden_hits.load(Ordering::Relaxed),
            ro_hits: self.ro_hits.load(Ordering::Relaxed),
            rw_hits: self.rw_hits.load(Ordering::Relaxed),
            zi_released: self.zi_released.load(Ordering::Relaxed),
            npages: self.npages.load(Ordering::Relaxed),
            npages_all: self.npages_all.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() {
        let stats = PagerStats::new();
        stats.ro_hit();
        stats.ro_hit();
        stats.rw_hit();
        stats.hidden_hit();
        stats.zi_released(3);
        stats.frame_donated();
        stats.frame_donated();
        stats.resident_inc();
        let snap = stats.snapshot();
        assert_eq!(snap.ro_hits, 2);
        assert_eq!(snap.rw_hits, 1);
        assert_eq!(snap.hidden_hits, 1);
        assert_eq!(snap.zi_released, 3);
        assert_eq!(snap.npages, 1);
        assert_eq!(snap.npages_all, 2);
    }

    #[test]
    fn fresh_stats_are_zero() {
        assert_eq!(PagerStats::new().snapshot(), Stats::default());
    }
}
