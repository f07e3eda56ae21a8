// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Demand paging for a small pinned secure kernel
//! OWNERS: @kernel-mm-team
//! PUBLIC API: Pager, LockedPager, AreaFlags, AreaBacking, AbortInfo
//! INVARIANTS: W^X on every installed mapping; read-only content is
//!             digest-verified on every load; lock-on-fault pages are
//!             never evicted
//!
//! The kernel image is larger than the pinned secure memory it runs
//! from. This crate supplies the missing piece: registered virtual
//! areas are backed lazily, read-only content is paged in from an
//! untrusted store and verified against per-page SHA-256 digests, and
//! anonymous read-write memory is zero-filled on first touch. A small
//! pool of donated physical frames is recycled with a two-chance clock
//! sweep; pages whose areas carry the lock flag stay resident once
//! faulted in.
//!
//! Platform specifics stay behind the [`hal`] traits. The `sim` module
//! implements them over plain host memory, which keeps the whole engine
//! testable off target.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod area;
pub mod evict;
pub mod fault;
pub mod hal;
pub mod page;
pub mod pager;
pub mod pool;
pub mod stats;
pub mod verify;

#[cfg(test)]
mod tests_prop;

pub use area::{AreaBacking, AreaError, AreaFlags, AreaIdx, Permission, RegisterError};
pub use fault::{AbortInfo, AccessKind, Fatal, FaultOutcome};
pub use page::PAGE_SIZE;
pub use pager::{LockedPager, Pager, PagerConfig};
pub use stats::Stats;
