// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Two-chance clock eviction over the frame pool
//! OWNERS: @kernel-mm-team
//! PUBLIC API: EvictionEngine
//! INVARIANTS: locked frames are never candidates; a resident frame is
//!             hidden on first consideration and reclaimed only if still
//!             hidden on the next visit
//!
//! Candidates are visited in pool-index order starting one past the last
//! victim (the clock hand). The first pass over a resident frame removes
//! its mapping and parks it in `Hidden`; a frame found already `Hidden`
//! is the victim. Touching a hidden frame in between restores it and
//! consumes a fresh grace period, which is what the `hidden_hits`
//! counter observes.

use crate::pool::{Frame, FrameIdx, FramePool, FrameState};

/// Clock-hand state for victim selection. Never blocks, never fails
/// except when no evictable frame exists.
#[derive(Default)]
pub struct EvictionEngine {
    hand: usize,
}

impl EvictionEngine {
    pub const fn new() -> Self {
        Self { hand: 0 }
    }

    /// Selects a victim frame, hiding first-chance frames on the way.
    ///
    /// `hide` is invoked for every frame transitioned to `Hidden` so the
    /// caller can remove its translation; the state change itself is
    /// done here. Returns `None` when nothing is evictable (all frames
    /// locked or free).
    pub fn select(
        &mut self,
        pool: &mut FramePool,
        mut hide: impl FnMut(&Frame),
    ) -> Option<FrameIdx> {
        let len = pool.len();
        if len == 0 {
            return None;
        }
        // Two sweeps: the first can only hide, the second then finds a
        // hidden frame, so 2 * len steps bound the walk.
        for step in 0..(2 * len) {
            let idx = (self.hand + step) % len;
            match pool.frame(idx).state() {
                FrameState::Hidden => {
                    self.hand = (idx + 1) % len;
                    return Some(idx);
                }
                FrameState::Clean | FrameState::Dirty => {
                    hide(pool.frame(idx));
                    pool.frame_mut(idx).set_state(FrameState::Hidden);
                }
                FrameState::Free | FrameState::Locked => {}
            }
        }
        None
    }
}
