// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Pageable area descriptors and the bounded area registry
//! OWNERS: @kernel-mm-team
//! PUBLIC API: Permission, AreaFlags, AreaBacking, Area, AreaRegistry
//! INVARIANTS: exec implies read-only; store+hashes iff read-only;
//!             registry is append-only and never mutated on rejection

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::hal::BackingStore;
use crate::page::{is_page_aligned, PAGE_SIZE};
use crate::verify::Digest;

/// Index-based handle into the registry; frame records back-reference
/// their owning area through this, avoiding ownership cycles.
pub type AreaIdx = usize;

/// Access mode of a pageable area. Exactly one applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    /// Content is authoritative in the backing store and verified on load.
    ReadOnly,
    /// Anonymous zero-initialized content, writable once faulted in.
    ReadWrite,
}

/// Validated capability descriptor for an area.
///
/// Invalid combinations (executable read-write memory) are rejected at
/// construction, so an `AreaFlags` value in hand is always coherent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaFlags {
    perm: Permission,
    exec: bool,
    lock: bool,
}

impl AreaFlags {
    /// Builds a descriptor, rejecting executable read-write areas.
    pub fn new(perm: Permission, exec: bool, lock: bool) -> Result<Self, AreaError> {
        if exec && perm != Permission::ReadOnly {
            return Err(AreaError::ExecRequiresReadOnly);
        }
        Ok(Self { perm, exec, lock })
    }

    /// Plain read-only data area.
    pub const fn read_only() -> Self {
        Self { perm: Permission::ReadOnly, exec: false, lock: false }
    }

    /// Read-only executable area (code).
    pub const fn executable() -> Self {
        Self { perm: Permission::ReadOnly, exec: true, lock: false }
    }

    /// Anonymous read-write area.
    pub const fn read_write() -> Self {
        Self { perm: Permission::ReadWrite, exec: false, lock: false }
    }

    /// Adds the lock-on-fault guarantee: once faulted in, a page keeps
    /// its physical frame until explicitly released.
    pub const fn with_lock(self) -> Self {
        Self { lock: true, ..self }
    }

    pub const fn permission(&self) -> Permission {
        self.perm
    }

    pub const fn is_executable(&self) -> bool {
        self.exec
    }

    pub const fn locks_on_fault(&self) -> bool {
        self.lock
    }
}

/// Backing for an area's content.
///
/// Store and hashes travel together, so the "store present iff hashes
/// present" coupling from the registration contract cannot be violated
/// by construction; only the pairing with [`Permission`] is checked at
/// registration time.
pub enum AreaBacking {
    /// Authoritative content in a backing store, one digest per page.
    Store {
        store: Box<dyn BackingStore>,
        hashes: Vec<Digest>,
    },
    /// Anonymous zero-initialized content, no store.
    Zero,
}

/// Fatal configuration errors for area registration.
///
/// These indicate a build-time misconfiguration; the caller at the
/// dispatch boundary halts rather than continuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaError {
    /// Base address is not page aligned.
    UnalignedBase,
    /// Size is not page aligned.
    UnalignedSize,
    /// Size is zero.
    EmptyArea,
    /// End of the range wraps the address space.
    AddressWrap,
    /// Executable requested for a non-read-only area.
    ExecRequiresReadOnly,
    /// Read-only area without a store, or read-write area with one.
    BackingMismatch,
    /// Number of digests does not match the page count.
    HashCountMismatch,
}

impl fmt::Display for AreaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaError::UnalignedBase => f.write_str("area base not page aligned"),
            AreaError::UnalignedSize => f.write_str("area size not page aligned"),
            AreaError::EmptyArea => f.write_str("area size is zero"),
            AreaError::AddressWrap => f.write_str("area wraps the address space"),
            AreaError::ExecRequiresReadOnly => f.write_str("executable area must be read-only"),
            AreaError::BackingMismatch => f.write_str("store/hashes do not match the permission"),
            AreaError::HashCountMismatch => f.write_str("one digest required per page"),
        }
    }
}

/// Recoverable registration failures, reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Range intersects an already registered area.
    Overlap,
    /// Registry slots are exhausted.
    Exhausted,
}

/// A registered pageable virtual range. Immutable once registered.
pub struct Area {
    base: usize,
    size: usize,
    flags: AreaFlags,
    backing: AreaBacking,
}

impl Area {
    /// Validates geometry and backing and builds the descriptor.
    ///
    /// All checks happen before any registry mutation, so a rejected
    /// area leaves no observable side effects.
    pub fn new(
        base: usize,
        size: usize,
        flags: AreaFlags,
        backing: AreaBacking,
    ) -> Result<Self, AreaError> {
        if !is_page_aligned(base) {
            return Err(AreaError::UnalignedBase);
        }
        if !is_page_aligned(size) {
            return Err(AreaError::UnalignedSize);
        }
        if size == 0 {
            return Err(AreaError::EmptyArea);
        }
        if base.checked_add(size).is_none() {
            return Err(AreaError::AddressWrap);
        }
        match (&flags.permission(), &backing) {
            (Permission::ReadOnly, AreaBacking::Store { hashes, .. }) => {
                if hashes.len() != size / PAGE_SIZE {
                    return Err(AreaError::HashCountMismatch);
                }
            }
            (Permission::ReadWrite, AreaBacking::Zero) => {}
            _ => return Err(AreaError::BackingMismatch),
        }
        Ok(Self { base, size, flags, backing })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn flags(&self) -> AreaFlags {
        self.flags
    }

    pub fn page_count(&self) -> usize {
        self.size / PAGE_SIZE
    }

    pub fn contains(&self, va: usize) -> bool {
        va >= self.base && va - self.base < self.size
    }

    /// Index of the page containing `va`, if inside the area.
    pub fn page_index_of(&self, va: usize) -> Option<usize> {
        if self.contains(va) {
            Some((va - self.base) / PAGE_SIZE)
        } else {
            None
        }
    }

    /// Virtual base address of page `index`.
    pub fn page_base(&self, index: usize) -> usize {
        debug_assert!(index < self.page_count());
        self.base + index * PAGE_SIZE
    }

    /// Store and digest for page `index`; `None` for read-write areas.
    pub(crate) fn store_and_hash(&self, index: usize) -> Option<(&dyn BackingStore, &Digest)> {
        match &self.backing {
            AreaBacking::Store { store, hashes } => Some((store.as_ref(), hashes.get(index)?)),
            AreaBacking::Zero => None,
        }
    }
}

/// Bounded, append-only arena of registered areas.
///
/// Steady-state faults only read the registry; dynamic unregistration
/// is deliberately unsupported.
pub struct AreaRegistry {
    areas: Vec<Area>,
    capacity: usize,
}

impl AreaRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { areas: Vec::new(), capacity }
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Appends `area`, rejecting overlaps and exhaustion without side
    /// effects.
    pub fn register(&mut self, area: Area) -> Result<AreaIdx, RegisterError> {
        if self.areas.len() >= self.capacity {
            return Err(RegisterError::Exhausted);
        }
        if self.overlaps(area.base, area.size) {
            return Err(RegisterError::Overlap);
        }
        self.areas.push(area);
        Ok(self.areas.len() - 1)
    }

    pub fn get(&self, idx: AreaIdx) -> &Area {
        &self.areas[idx]
    }

    /// Finds the area containing `va`.
    pub fn find(&self, va: usize) -> Option<(AreaIdx, &Area)> {
        self.areas
            .iter()
            .enumerate()
            .find(|(_, area)| area.contains(va))
    }

    fn overlaps(&self, base: usize, size: usize) -> bool {
        let end = base + size;
        self.areas
            .iter()
            .any(|area| base < area.base + area.size && area.base < end)
    }
}
