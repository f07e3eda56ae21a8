// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators for host tests and bring-up.
//!
//! `SimTable` is a flat translation table in the spirit of the bootstrap
//! page table, `SimPhysMem` owns a carveout of fake physical frames and
//! doubles as the alias window, and `SliceStore` serves area content
//! from a byte buffer.

extern crate alloc;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::hal::{AliasWindow, BackingStore, MapEntry, MapError, MapPerm, StoreError, TranslationTable};
use crate::page::{align_down, is_page_aligned, PAGE_SIZE};

/// Flat translation table keyed by page-aligned virtual address.
#[derive(Default)]
pub struct SimTable {
    entries: BTreeMap<usize, MapEntry>,
}

impl SimTable {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Number of installed mappings.
    pub fn mapped_pages(&self) -> usize {
        self.entries.len()
    }
}

impl TranslationTable for SimTable {
    fn lookup(&self, va: usize) -> Option<MapEntry> {
        self.entries.get(&align_down(va)).copied()
    }

    fn install(&mut self, va: usize, pa: usize, perm: MapPerm) -> Result<(), MapError> {
        if !is_page_aligned(va) || !is_page_aligned(pa) {
            return Err(MapError::Unaligned);
        }
        if perm.is_empty() {
            return Err(MapError::PermissionDenied);
        }
        if perm.contains(MapPerm::WRITE) && perm.contains(MapPerm::EXECUTE) {
            return Err(MapError::PermissionDenied);
        }
        if self.entries.contains_key(&va) {
            return Err(MapError::Overlap);
        }
        self.entries.insert(va, MapEntry { pa, perm });
        Ok(())
    }

    fn remove(&mut self, va: usize) -> Option<usize> {
        self.entries.remove(&align_down(va)).map(|entry| entry.pa)
    }
}

/// Owned carveout of frames addressed by fake physical address, also
/// serving as the alias window over them.
pub struct SimPhysMem {
    base: usize,
    frames: Vec<Box<[u8; PAGE_SIZE]>>,
}

impl SimPhysMem {
    /// Creates `nframes` zeroed frames starting at physical `base`.
    pub fn new(base: usize, nframes: usize) -> Self {
        assert!(is_page_aligned(base), "carveout base must be page aligned");
        let mut frames = Vec::with_capacity(nframes);
        for _ in 0..nframes {
            frames.push(Box::new([0u8; PAGE_SIZE]));
        }
        Self { base, frames }
    }

    /// Physical address of frame `index`.
    pub fn frame_pa(&self, index: usize) -> usize {
        assert!(index < self.frames.len(), "frame index out of carveout");
        self.base + index * PAGE_SIZE
    }

    /// Number of frames in the carveout.
    pub fn nframes(&self) -> usize {
        self.frames.len()
    }
}

impl AliasWindow for SimPhysMem {
    fn with_frame<R>(&mut self, pa: usize, f: impl FnOnce(&mut [u8; PAGE_SIZE]) -> R) -> R {
        let offset = pa.checked_sub(self.base).expect("alias: pa below carveout");
        assert!(is_page_aligned(offset), "alias: pa not frame aligned");
        let index = offset / PAGE_SIZE;
        assert!(index < self.frames.len(), "alias: pa beyond carveout");
        f(&mut self.frames[index])
    }
}

/// Backing store serving pages out of an owned byte buffer.
///
/// The buffer must cover every page of the area it backs; short reads
/// are reported as [`StoreError::OutOfBounds`].
pub struct SliceStore {
    bytes: Vec<u8>,
}

impl SliceStore {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }
}

impl BackingStore for SliceStore {
    fn read_page(&self, index: usize, buf: &mut [u8; PAGE_SIZE]) -> Result<(), StoreError> {
        let start = index.checked_mul(PAGE_SIZE).ok_or(StoreError::OutOfBounds)?;
        let end = start.checked_add(PAGE_SIZE).ok_or(StoreError::OutOfBounds)?;
        let src = self.bytes.get(start..end).ok_or(StoreError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// Store whose every read fails, for exercising the I/O-error path.
pub struct FailingStore;

impl BackingStore for FailingStore {
    fn read_page(&self, _index: usize, _buf: &mut [u8; PAGE_SIZE]) -> Result<(), StoreError> {
        Err(StoreError::Io)
    }
}
