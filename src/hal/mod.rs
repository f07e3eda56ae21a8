// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Hardware collaborator interfaces consumed by the pager
//! OWNERS: @kernel-mm-team
//! PUBLIC API: TranslationTable, AliasWindow, BackingStore, MapPerm
//! INVARIANTS: W^X enforced at install; alias access is scoped per frame
//!
//! The engine decides *what* to map and *when*; encoding page-table
//! entries, touching physical frames and reading the store medium are
//! the platform's job and stay behind these traits.

use core::fmt;

use bitflags::bitflags;

use crate::page::PAGE_SIZE;

pub mod sim;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    /// Access permissions requested for an installed mapping.
    pub struct MapPerm: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

/// An installed translation for a single page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapEntry {
    /// Physical address of the backing frame.
    pub pa: usize,
    /// Permissions the mapping was installed with.
    pub perm: MapPerm,
}

/// Error returned by translation-table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// Virtual or physical address was not page aligned.
    Unaligned,
    /// Address falls outside the range the table covers.
    OutOfRange,
    /// Requested permissions violate the W^X policy or are empty.
    PermissionDenied,
    /// Mapping collides with an existing entry.
    Overlap,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Unaligned => f.write_str("address not page aligned"),
            MapError::OutOfRange => f.write_str("address outside table range"),
            MapError::PermissionDenied => f.write_str("permissions rejected"),
            MapError::Overlap => f.write_str("mapping already present"),
        }
    }
}

/// Error returned by the backing-store reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Requested page lies beyond the store contents.
    OutOfBounds,
    /// The medium reported an I/O failure.
    Io,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::OutOfBounds => f.write_str("read beyond store"),
            StoreError::Io => f.write_str("store i/o error"),
        }
    }
}

/// Translation-table abstraction the pager drives.
///
/// Implementations encode the actual page-table entries and perform the
/// TLB maintenance their architecture needs on `install`/`remove`.
pub trait TranslationTable {
    /// Returns the mapping covering `va`, if one is installed.
    fn lookup(&self, va: usize) -> Option<MapEntry>;

    /// Installs a 4 KiB mapping from `va` to `pa`.
    ///
    /// Must reject `WRITE | EXECUTE` combinations.
    fn install(&mut self, va: usize, pa: usize, perm: MapPerm) -> Result<(), MapError>;

    /// Removes the mapping at `va`, returning the physical address it
    /// pointed at.
    fn remove(&mut self, va: usize) -> Option<usize>;
}

/// Scoped access to any pool frame's bytes through the fixed alias range.
///
/// The pager loads, zeroes and hashes frames through this window before
/// they are installed into the real translation table. The alias mapping
/// is torn down when the closure returns.
pub trait AliasWindow {
    /// Runs `f` over the bytes of the frame at physical address `pa`.
    fn with_frame<R>(&mut self, pa: usize, f: impl FnOnce(&mut [u8; PAGE_SIZE]) -> R) -> R;
}

/// Synchronous, bounded reader for the authoritative content of a
/// read-only pageable area.
pub trait BackingStore: Send + Sync {
    /// Reads the page at `index` (in pages from the start of the area)
    /// into `buf`.
    fn read_page(&self, index: usize, buf: &mut [u8; PAGE_SIZE]) -> Result<(), StoreError>;
}
