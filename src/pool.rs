// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded pool of physical frames donated to the pager.
//!
//! The pool never allocates memory for frames; it only tracks frames
//! handed over via `add_pages`. Each frame backs at most one
//! (area, page) pair at a time.

extern crate alloc;

use alloc::vec::Vec;

use crate::area::AreaIdx;

/// Index of a frame within the pool.
pub type FrameIdx = usize;

/// Lifecycle state of a pool frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Not backing any page.
    Free,
    /// Resident, content re-derivable from the backing store.
    Clean,
    /// Resident read-write content.
    Dirty,
    /// Resident but unmapped; grace period before eviction.
    Hidden,
    /// Resident and permanently excluded from eviction.
    Locked,
}

/// One donated physical frame.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    pa: usize,
    state: FrameState,
    /// Non-owning back-reference to the (area, page) the frame backs.
    /// Kept on a freed read-write frame as a reuse tag so a released
    /// page that faults again can find its old frame.
    owner: Option<(AreaIdx, usize)>,
}

impl Frame {
    pub fn pa(&self) -> usize {
        self.pa
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn owner(&self) -> Option<(AreaIdx, usize)> {
        self.owner
    }

    pub fn is_resident(&self) -> bool {
        !matches!(self.state, FrameState::Free)
    }

    pub(crate) fn set_state(&mut self, state: FrameState) {
        self.state = state;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<(AreaIdx, usize)>) {
        self.owner = owner;
    }
}

/// The frame pool. Grows only by donation.
#[derive(Default)]
pub struct FramePool {
    frames: Vec<Frame>,
}

impl FramePool {
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Number of donated frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames currently backing pages.
    pub fn resident_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_resident()).count()
    }

    /// Donates a free frame at physical address `pa`.
    pub fn donate(&mut self, pa: usize) -> FrameIdx {
        self.frames.push(Frame { pa, state: FrameState::Free, owner: None });
        self.frames.len() - 1
    }

    /// Donates a frame that already backs `owner` in state `state`.
    pub fn donate_resident(
        &mut self,
        pa: usize,
        owner: (AreaIdx, usize),
        state: FrameState,
    ) -> FrameIdx {
        debug_assert!(!matches!(state, FrameState::Free));
        self.frames.push(Frame { pa, state, owner: Some(owner) });
        self.frames.len() - 1
    }

    pub fn frame(&self, idx: FrameIdx) -> &Frame {
        &self.frames[idx]
    }

    pub fn frame_mut(&mut self, idx: FrameIdx) -> &mut Frame {
        &mut self.frames[idx]
    }

    /// First free frame, if any.
    pub fn find_free(&self) -> Option<FrameIdx> {
        self.frames.iter().position(|f| f.state == FrameState::Free)
    }

    /// Free frame still tagged with `owner` (released page reuse).
    pub fn find_free_tagged(&self, owner: (AreaIdx, usize)) -> Option<FrameIdx> {
        self.frames
            .iter()
            .position(|f| f.state == FrameState::Free && f.owner == Some(owner))
    }

    /// Resident frame backing `owner`, if any.
    pub fn find_resident(&self, owner: (AreaIdx, usize)) -> Option<FrameIdx> {
        self.frames
            .iter()
            .position(|f| f.is_resident() && f.owner == Some(owner))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}
