// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Pager context object: lifecycle, fault handling, alloc/release
//! OWNERS: @kernel-mm-team
//! PUBLIC API: Pager, PagerConfig, LockedPager
//! INVARIANTS: one frame per (area, page); hidden frames are unmapped;
//!             locked frames leave the pool only via release_phys;
//!             fatal conditions surface as values until the dispatch
//!             boundary, which diagnoses and halts
//!
//! The pager is constructed once, fed its core areas, enabled with
//! `init`, and from then on driven by the abort dispatcher through
//! `handle_fault` plus the synchronous `alloc`/`release_phys` entry
//! points. `LockedPager` supplies the system-wide mutual-exclusion
//! domain: all mutation serializes behind one spin lock while counter
//! snapshots stay lock-free.

extern crate alloc;

use alloc::sync::Arc;
use core::ops::Range;

use log::{debug, error, info, trace, warn};

use crate::area::{Area, AreaBacking, AreaFlags, AreaRegistry, Permission};
use crate::evict::EvictionEngine;
use crate::fault::{AbortInfo, AccessKind, Fatal, FaultOutcome};
use crate::hal::{AliasWindow, MapPerm, TranslationTable};
use crate::page::{align_down, align_up, PAGE_SIZE};
use crate::pool::{FrameIdx, FramePool, FrameState};
use crate::stats::{PagerStats, Stats};
#[cfg(feature = "paging")]
use crate::verify::verify_page;

/// Static configuration fixed at construction.
pub struct PagerConfig {
    /// Virtual range carved up by [`Pager::alloc`].
    pub alloc_range: Range<usize>,
    /// Registry slots available for core and allocated areas.
    pub max_areas: usize,
}

/// The demand-paging engine.
///
/// Owns the area registry, the donated frame pool, the eviction clock
/// and the platform collaborators. Not internally synchronized; wrap it
/// in [`LockedPager`] when faults can arrive from more than one core.
pub struct Pager<T: TranslationTable, W: AliasWindow> {
    table: T,
    alias: W,
    areas: AreaRegistry,
    pool: FramePool,
    evict: EvictionEngine,
    stats: Arc<PagerStats>,
    alloc_next: usize,
    alloc_end: usize,
    initialized: bool,
}

impl<T: TranslationTable, W: AliasWindow> Pager<T, W> {
    /// Builds the engine around the platform collaborators.
    pub fn new(table: T, alias: W, config: PagerConfig) -> Self {
        Self {
            table,
            alias,
            areas: AreaRegistry::with_capacity(config.max_areas),
            pool: FramePool::new(),
            evict: EvictionEngine::new(),
            stats: Arc::new(PagerStats::new()),
            alloc_next: align_up(config.alloc_range.start),
            alloc_end: align_down(config.alloc_range.end),
            initialized: false,
        }
    }

    /// Registers a pageable core area.
    ///
    /// Malformed input (bad geometry, flag/backing mismatch) is a
    /// build-time misconfiguration and comes back as `Err(Fatal)` for
    /// the boundary to halt on. Overlap and registry exhaustion are
    /// runtime conditions reported as `Ok(false)` with no side effects.
    pub fn add_core_area(
        &mut self,
        base: usize,
        size: usize,
        flags: AreaFlags,
        backing: AreaBacking,
    ) -> Result<bool, Fatal> {
        let area = Area::new(base, size, flags, backing).map_err(Fatal::BadArea)?;
        match self.areas.register(area) {
            Ok(idx) => {
                info!(
                    target: "pager",
                    "area {}: {:#x}..{:#x} {:?}",
                    idx,
                    base,
                    base + size,
                    flags
                );
                Ok(true)
            }
            Err(err) => {
                warn!(target: "pager", "area {:#x}..{:#x} rejected: {:?}", base, base + size, err);
                Ok(false)
            }
        }
    }

    /// One-time enable. Fatal if called twice or before any area exists.
    pub fn init(&mut self) -> Result<(), Fatal> {
        if self.initialized {
            return Err(Fatal::DoubleInit);
        }
        if self.areas.is_empty() {
            return Err(Fatal::NoAreas);
        }
        self.initialized = true;
        info!(target: "pager", "enabled: {} areas registered", self.areas.len());
        Ok(())
    }

    /// Donates the physical frames backing an already-mapped virtual
    /// range to the pool. Unmapped pages in the range are skipped.
    ///
    /// With `unmap` the original mapping is removed and re-established
    /// lazily on the next fault; without it, pages inside a registered
    /// area stay resident with their owner recorded. A mapped page
    /// outside every area can only be donated with `unmap`, since a
    /// resident frame needs an owner record.
    pub fn add_pages(&mut self, vaddr: usize, npages: usize, unmap: bool) {
        let base = align_down(vaddr);
        for i in 0..npages {
            let va = match base.checked_add(i * PAGE_SIZE) {
                Some(va) => va,
                None => break,
            };
            let entry = match self.table.lookup(va) {
                Some(entry) => entry,
                None => {
                    trace!(target: "pager", "add_pages: {:#x} unmapped, skipped", va);
                    continue;
                }
            };
            let found = self
                .areas
                .find(va)
                .map(|(aidx, area)| (aidx, area.page_index_of(va), area.flags()));
            match found {
                Some((aidx, Some(page), flags)) => {
                    if unmap {
                        let _ = self.table.remove(va);
                        self.pool.donate(entry.pa);
                        self.stats.frame_donated();
                    } else {
                        let state = if flags.locks_on_fault() {
                            FrameState::Locked
                        } else if flags.permission() == Permission::ReadWrite {
                            FrameState::Dirty
                        } else {
                            FrameState::Clean
                        };
                        self.pool.donate_resident(entry.pa, (aidx, page), state);
                        self.stats.frame_donated();
                        self.stats.resident_inc();
                    }
                }
                _ => {
                    if unmap {
                        let _ = self.table.remove(va);
                        self.pool.donate(entry.pa);
                        self.stats.frame_donated();
                    } else {
                        warn!(
                            target: "pager",
                            "add_pages: {:#x} mapped outside any area, skipped",
                            va
                        );
                    }
                }
            }
        }
    }

    /// Reserves a fresh anonymous read-write area and returns its base.
    ///
    /// Only the lock flag of `flags` is honored. `None` reports
    /// virtual-space or registry exhaustion; never fatal.
    pub fn alloc(&mut self, size: usize, flags: AreaFlags) -> Option<usize> {
        if size == 0 {
            return None;
        }
        let size = align_up(size);
        let rw = if flags.locks_on_fault() {
            AreaFlags::read_write().with_lock()
        } else {
            AreaFlags::read_write()
        };
        let base = self.alloc_next;
        let end = base.checked_add(size)?;
        if end > self.alloc_end {
            warn!(target: "pager", "alloc: {} bytes exceed the remaining virtual range", size);
            return None;
        }
        let area = Area::new(base, size, rw, AreaBacking::Zero).ok()?;
        match self.areas.register(area) {
            Ok(idx) => {
                self.alloc_next = end;
                debug!(target: "pager", "alloc: area {} at {:#x}, {} bytes", idx, base, size);
                Some(base)
            }
            Err(err) => {
                warn!(target: "pager", "alloc: registry rejected area: {:?}", err);
                None
            }
        }
    }

    /// Releases the physical frames behind every page fully covered by
    /// the range. A hint only: the virtual allocation stays valid and
    /// re-faults with zero-filled content.
    pub fn release_phys(&mut self, addr: usize, size: usize) {
        let start = align_up(addr);
        let end = align_down(addr.saturating_add(size));
        let mut va = start;
        while va < end {
            let found = self
                .areas
                .find(va)
                .map(|(aidx, area)| (aidx, area.page_index_of(va), area.flags()));
            if let Some((aidx, Some(page), flags)) = found {
                if let Some(fidx) = self.pool.find_resident((aidx, page)) {
                    let _ = self.table.remove(va);
                    {
                        let frame = self.pool.frame_mut(fidx);
                        frame.set_state(FrameState::Free);
                        // Read-write frames keep their tag so an
                        // untouched released page can reclaim the same
                        // frame; read-only content is just dropped.
                        if flags.permission() == Permission::ReadOnly {
                            frame.set_owner(None);
                        }
                    }
                    if flags.permission() == Permission::ReadWrite {
                        self.stats.zi_released(1);
                    }
                    self.stats.resident_dec();
                    trace!(target: "pager", "release: {:#x}", va);
                }
            }
            va += PAGE_SIZE;
        }
    }

    /// Counter snapshot.
    #[cfg(feature = "paging")]
    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    /// Without demand paging there is nothing to count.
    #[cfg(not(feature = "paging"))]
    pub fn stats(&self) -> Stats {
        Stats::default()
    }

    /// Read-only view of the translation table, e.g. for TLB shootdown
    /// bookkeeping or diagnostics.
    pub fn translation(&self) -> &T {
        &self.table
    }

    /// Runs `f` over the frame bytes currently backing `va`, if the
    /// page is resident. Diagnostic/selftest surface.
    pub fn with_resident_page<R>(
        &mut self,
        va: usize,
        f: impl FnOnce(&[u8; PAGE_SIZE]) -> R,
    ) -> Option<R> {
        let va_page = align_down(va);
        let (aidx, page) = match self.areas.find(va_page) {
            Some((aidx, area)) => (aidx, area.page_index_of(va_page)?),
            None => return None,
        };
        let fidx = self.pool.find_resident((aidx, page))?;
        let pa = self.pool.frame(fidx).pa();
        Some(self.alias.with_frame(pa, |buf| f(buf)))
    }

    pub(crate) fn stats_handle(&self) -> Arc<PagerStats> {
        self.stats.clone()
    }

    /// Resolves a page fault: lookup, classify, load/zero-fill with
    /// verification, install, resume.
    ///
    /// Every `Err` is in the fatal taxonomy; the dispatch boundary
    /// prints diagnostics and halts. A resolved fault returns the
    /// outcome so the dispatcher can resume the faulting context.
    #[cfg(feature = "paging")]
    pub fn handle_fault(&mut self, ai: &AbortInfo) -> Result<FaultOutcome, Fatal> {
        if !self.initialized {
            return Err(Fatal::NotInitialized);
        }
        let va_page = align_down(ai.va);
        let (aidx, page, flags) = match self.areas.find(ai.va) {
            Some((aidx, area)) => match area.page_index_of(va_page) {
                Some(page) => (aidx, page, area.flags()),
                None => return Err(Fatal::NoAreaForAddress { va: ai.va }),
            },
            None => return Err(Fatal::NoAreaForAddress { va: ai.va }),
        };

        match ai.access {
            AccessKind::Write if flags.permission() == Permission::ReadOnly => {
                return Err(Fatal::AccessViolation { va: ai.va, access: ai.access });
            }
            AccessKind::Execute if !flags.is_executable() => {
                return Err(Fatal::AccessViolation { va: ai.va, access: ai.access });
            }
            _ => {}
        }

        // Classify: a resident frame means the content is still there
        // and only the mapping is missing (hidden or stale).
        if let Some(fidx) = self.pool.find_resident((aidx, page)) {
            if self.table.lookup(va_page).is_some() {
                // Another core resolved this fault before we took the
                // lock.
                trace!(target: "pager", "spurious fault at {:#x}", ai.va);
                return Ok(FaultOutcome::Spurious);
            }
            let pa = self.pool.frame(fidx).pa();
            self.table
                .install(va_page, pa, Self::map_perm(flags))
                .map_err(Fatal::InstallFailed)?;
            self.pool.frame_mut(fidx).set_state(Self::resident_state(flags));
            self.stats.hidden_hit();
            debug!(target: "pager", "hidden hit at {:#x}", va_page);
            return Ok(FaultOutcome::HiddenHit);
        }

        // Genuine miss. A released read-write page prefers its old
        // frame if nothing repurposed it yet.
        let mut reused = false;
        let fidx = if flags.permission() == Permission::ReadWrite {
            match self.pool.find_free_tagged((aidx, page)) {
                Some(idx) => {
                    reused = true;
                    idx
                }
                None => self.acquire_frame()?,
            }
        } else {
            self.acquire_frame()?
        };
        let pa = self.pool.frame(fidx).pa();

        let outcome = match flags.permission() {
            Permission::ReadOnly => {
                {
                    let Self { ref mut alias, ref areas, .. } = *self;
                    let area = areas.get(aidx);
                    let (store, hash) = area
                        .store_and_hash(page)
                        .ok_or(Fatal::BadArea(crate::area::AreaError::BackingMismatch))?;
                    alias
                        .with_frame(pa, |buf| store.read_page(page, buf))
                        .map_err(|err| Fatal::StoreReadFailed { area: aidx, page, err })?;
                    if alias.with_frame(pa, |buf| verify_page(buf, hash)).is_err() {
                        return Err(Fatal::VerificationFailed { area: aidx, page });
                    }
                }
                self.stats.ro_hit();
                FaultOutcome::Loaded
            }
            Permission::ReadWrite => {
                self.alias.with_frame(pa, |buf| buf.fill(0));
                if reused {
                    self.stats.hidden_hit();
                    FaultOutcome::HiddenHit
                } else {
                    self.stats.rw_hit();
                    FaultOutcome::ZeroFilled
                }
            }
        };

        self.table
            .install(va_page, pa, Self::map_perm(flags))
            .map_err(Fatal::InstallFailed)?;
        {
            let frame = self.pool.frame_mut(fidx);
            frame.set_owner(Some((aidx, page)));
            frame.set_state(Self::resident_state(flags));
        }
        self.stats.resident_inc();
        debug!(target: "pager", "fault at {:#x} resolved: {:?}", ai.va, outcome);
        Ok(outcome)
    }

    /// Degraded build: any fault is unexpected and fatal.
    #[cfg(not(feature = "paging"))]
    pub fn handle_fault(&mut self, ai: &AbortInfo) -> Result<FaultOutcome, Fatal> {
        let _ = ai;
        Err(Fatal::PagingDisabled)
    }

    /// Free frame, or an eviction victim, or fatal exhaustion.
    #[cfg(feature = "paging")]
    fn acquire_frame(&mut self) -> Result<FrameIdx, Fatal> {
        if let Some(idx) = self.pool.find_free() {
            return Ok(idx);
        }
        let victim = {
            let Self { ref mut pool, ref mut evict, ref mut table, ref areas, .. } = *self;
            evict.select(pool, |frame| {
                if let Some((aidx, page)) = frame.owner() {
                    let va = areas.get(aidx).page_base(page);
                    let _ = table.remove(va);
                }
            })
        };
        let idx = victim.ok_or(Fatal::NoFrameAvailable)?;
        // Reclaim: read-write content is lost (anonymous pages count as
        // released zero-initialized memory); read-only content is
        // re-derivable from the store.
        if let Some((aidx, _)) = self.pool.frame(idx).owner() {
            if self.areas.get(aidx).flags().permission() == Permission::ReadWrite {
                self.stats.zi_released(1);
            }
        }
        {
            let frame = self.pool.frame_mut(idx);
            frame.set_state(FrameState::Free);
            frame.set_owner(None);
        }
        self.stats.resident_dec();
        trace!(target: "pager", "evicted frame {}", idx);
        Ok(idx)
    }

    #[cfg(feature = "paging")]
    fn map_perm(flags: AreaFlags) -> MapPerm {
        match flags.permission() {
            Permission::ReadOnly => {
                if flags.is_executable() {
                    MapPerm::READ | MapPerm::EXECUTE
                } else {
                    MapPerm::READ
                }
            }
            Permission::ReadWrite => MapPerm::READ | MapPerm::WRITE,
        }
    }

    #[cfg(feature = "paging")]
    fn resident_state(flags: AreaFlags) -> FrameState {
        if flags.locks_on_fault() {
            FrameState::Locked
        } else if flags.permission() == Permission::ReadWrite {
            FrameState::Dirty
        } else {
            FrameState::Clean
        }
    }
}

/// The system-wide mutual-exclusion domain around the engine.
///
/// At most one fault or administrative operation mutates pool and
/// mapping state at a time; concurrent faults on other cores serialize
/// on the spin lock. Counter snapshots bypass the lock entirely.
pub struct LockedPager<T: TranslationTable, W: AliasWindow> {
    inner: spin::Mutex<Pager<T, W>>,
    stats: Arc<PagerStats>,
}

impl<T: TranslationTable, W: AliasWindow> LockedPager<T, W> {
    pub fn new(pager: Pager<T, W>) -> Self {
        let stats = pager.stats_handle();
        Self { inner: spin::Mutex::new(pager), stats }
    }

    /// Runs an administrative operation under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut Pager<T, W>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Serialized fault entry point for the abort dispatcher.
    pub fn handle_fault(&self, ai: &AbortInfo) -> Result<FaultOutcome, Fatal> {
        self.inner.lock().handle_fault(ai)
    }

    /// Lock-free counter snapshot; values may be stale under load.
    #[cfg(feature = "paging")]
    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    #[cfg(not(feature = "paging"))]
    pub fn stats(&self) -> Stats {
        Stats::default()
    }

    /// The diagnose-and-halt boundary.
    ///
    /// An unresolvable fault prints the abort context and panics; the
    /// embedder's panic handler parks the processor. This is the only
    /// place a fatal value is unwrapped.
    pub fn dispatch_fault(&self, ai: &AbortInfo) -> FaultOutcome {
        match self.handle_fault(ai) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    target: "pager",
                    "abort va={:#x} access={:?} raw={:#x}: {}",
                    ai.va,
                    ai.access,
                    ai.raw,
                    err
                );
                panic!("pager: unrecoverable fault: {}", err);
            }
        }
    }
}
