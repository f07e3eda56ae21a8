// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fault context and the fatal-error taxonomy.
//!
//! Internal pager paths report fatal conditions as values; the single
//! diagnose-and-halt point is the dispatch boundary in [`crate::pager`].

use core::fmt;

use crate::area::{AreaError, AreaIdx};
use crate::hal::{MapError, StoreError};

/// Kind of access that raised the fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

/// Context handed over by the exception-dispatch collaborator.
#[derive(Clone, Copy, Debug)]
pub struct AbortInfo {
    /// Faulting virtual address.
    pub va: usize,
    /// Access type derived from the fault syndrome.
    pub access: AccessKind,
    /// Raw architecture syndrome, only used for diagnostics.
    pub raw: usize,
}

/// How a fault was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The page was already mapped when the handler got the lock.
    Spurious,
    /// Hit on a still-resident frame (hidden or released-and-reused).
    HiddenHit,
    /// Page loaded from the backing store and verified.
    Loaded,
    /// Fresh zero-filled read-write page.
    ZeroFilled,
}

/// Conditions the engine cannot safely continue past.
///
/// Carried to the dispatch boundary, which prints diagnostics and halts;
/// no unwinding across the fault-handling boundary is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatal {
    /// Fault taken before `init` completed.
    NotInitialized,
    /// `init` called twice.
    DoubleInit,
    /// `init` called before any area was registered.
    NoAreas,
    /// Malformed area registration (build-time misconfiguration).
    BadArea(AreaError),
    /// Pool exhausted and nothing evictable.
    NoFrameAvailable,
    /// Loaded page did not match its registered digest.
    VerificationFailed { area: AreaIdx, page: usize },
    /// Backing store failed while resolving a fault.
    StoreReadFailed { area: AreaIdx, page: usize, err: StoreError },
    /// Faulting address is not covered by any registered area.
    NoAreaForAddress { va: usize },
    /// Access kind not permitted by the area's flags.
    AccessViolation { va: usize, access: AccessKind },
    /// Translation-table driver rejected the mapping.
    InstallFailed(MapError),
    /// Built without demand paging; every fault is unexpected.
    PagingDisabled,
}

impl From<AreaError> for Fatal {
    fn from(err: AreaError) -> Self {
        Fatal::BadArea(err)
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::NotInitialized => f.write_str("pager not initialized"),
            Fatal::DoubleInit => f.write_str("pager initialized twice"),
            Fatal::NoAreas => f.write_str("pager initialized with no areas"),
            Fatal::BadArea(err) => write!(f, "malformed area: {}", err),
            Fatal::NoFrameAvailable => f.write_str("frame pool exhausted, nothing evictable"),
            Fatal::VerificationFailed { area, page } => {
                write!(f, "digest mismatch for area {} page {}", area, page)
            }
            Fatal::StoreReadFailed { area, page, err } => {
                write!(f, "store read failed for area {} page {}: {}", area, page, err)
            }
            Fatal::NoAreaForAddress { va } => {
                write!(f, "no pageable area covers {:#x}", va)
            }
            Fatal::AccessViolation { va, access } => {
                write!(f, "{:?} access not permitted at {:#x}", access, va)
            }
            Fatal::InstallFailed(err) => write!(f, "mapping install failed: {}", err),
            Fatal::PagingDisabled => f.write_str("page fault without demand paging support"),
        }
    }
}
