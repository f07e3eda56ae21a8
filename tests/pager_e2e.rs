// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end paging scenarios over the simulated platform: a small
//! donated carveout, a verified read-only image, anonymous allocations
//! and the serialized fault path behind `LockedPager`.

#![cfg(feature = "paging")]

use nexus_pager::hal::sim::{SimPhysMem, SimTable, SliceStore};
use nexus_pager::hal::{MapPerm, TranslationTable};
use nexus_pager::verify::page_digest;
use nexus_pager::{
    AbortInfo, AccessKind, AreaBacking, AreaFlags, Fatal, FaultOutcome, LockedPager, Pager,
    PagerConfig, PAGE_SIZE,
};

const DONOR_VA: usize = 0x4000_0000;
const CARVEOUT_PA: usize = 0x8000_0000;
const IMAGE_BASE: usize = 0x2000_0000;
const ALLOC_BASE: usize = 0x3000_0000;

struct Harness {
    pager: Pager<SimTable, SimPhysMem>,
    image: Vec<u8>,
}

impl Harness {
    /// Boot sequence: map the carveout, register the read-only image,
    /// enable, then donate the carveout frames to the pool.
    fn boot(nframes: usize, image_pages: usize) -> Self {
        let mut table = SimTable::new();
        let mem = SimPhysMem::new(CARVEOUT_PA, nframes);
        for i in 0..nframes {
            table
                .install(DONOR_VA + i * PAGE_SIZE, mem.frame_pa(i), MapPerm::READ | MapPerm::WRITE)
                .expect("carveout mapping");
        }
        let image: Vec<u8> =
            (0..image_pages * PAGE_SIZE).map(|i| (i / PAGE_SIZE ^ i) as u8).collect();
        let hashes = image.chunks_exact(PAGE_SIZE).map(page_digest).collect();
        let backing =
            AreaBacking::Store { store: Box::new(SliceStore::new(image.clone())), hashes };

        let mut pager = Pager::new(
            table,
            mem,
            PagerConfig { alloc_range: ALLOC_BASE..ALLOC_BASE + 256 * PAGE_SIZE, max_areas: 8 },
        );
        assert_eq!(
            pager.add_core_area(
                IMAGE_BASE,
                image_pages * PAGE_SIZE,
                AreaFlags::read_only(),
                backing
            ),
            Ok(true)
        );
        pager.init().expect("init");
        pager.add_pages(DONOR_VA, nframes, true);
        Harness { pager, image }
    }

    fn read(&mut self, va: usize) -> Result<FaultOutcome, Fatal> {
        self.pager.handle_fault(&AbortInfo { va, access: AccessKind::Read, raw: 0x96 })
    }

    fn page_matches_image(&mut self, page: usize) -> bool {
        let expected = &self.image[page * PAGE_SIZE..(page + 1) * PAGE_SIZE];
        self.pager
            .with_resident_page(IMAGE_BASE + page * PAGE_SIZE, |buf| buf[..] == *expected)
            .expect("page resident")
    }
}

// Cold and warm faults against a verified read-only image.
#[test]
fn read_only_image_pages_in_with_verification() {
    let mut h = Harness::boot(4, 2);
    assert_eq!(h.read(IMAGE_BASE + 123), Ok(FaultOutcome::Loaded));
    let stats = h.pager.stats();
    assert_eq!(stats.ro_hits, 1);
    assert_eq!(stats.npages, 1);
    assert!(h.page_matches_image(0));

    assert_eq!(h.read(IMAGE_BASE + PAGE_SIZE), Ok(FaultOutcome::Loaded));
    let stats = h.pager.stats();
    assert_eq!(stats.ro_hits, 2);
    assert_eq!(stats.npages, 2);
    assert!(h.page_matches_image(1));
    assert!(stats.npages <= stats.npages_all);
}

// A locked allocation survives arbitrary pool pressure untouched.
#[test]
fn locked_allocation_is_never_evicted() {
    let mut h = Harness::boot(4, 16);
    let base =
        h.pager.alloc(2 * PAGE_SIZE, AreaFlags::read_write().with_lock()).expect("alloc");
    for offset in [0, PAGE_SIZE] {
        assert_eq!(
            h.pager.handle_fault(&AbortInfo {
                va: base + offset,
                access: AccessKind::Write,
                raw: 0
            }),
            Ok(FaultOutcome::ZeroFilled)
        );
    }
    // Far more image faults than the pool can hold at once.
    for page in 0..16 {
        h.read(IMAGE_BASE + page * PAGE_SIZE).expect("image fault");
    }
    for offset in [0, PAGE_SIZE] {
        assert!(h.pager.translation().lookup(base + offset).is_some());
        let zeroed = h
            .pager
            .with_resident_page(base + offset, |buf| buf.iter().all(|b| *b == 0))
            .expect("locked page resident");
        assert!(zeroed);
    }
    let stats = h.pager.stats();
    assert!(stats.npages <= 4);
}

// A store page whose content no longer matches its digest halts the
// fault instead of exposing the bytes.
#[test]
fn tampered_store_page_is_refused() {
    let mut table = SimTable::new();
    let mem = SimPhysMem::new(CARVEOUT_PA, 2);
    for i in 0..2 {
        table
            .install(DONOR_VA + i * PAGE_SIZE, mem.frame_pa(i), MapPerm::READ | MapPerm::WRITE)
            .expect("carveout mapping");
    }
    let mut image = vec![0x5au8; 2 * PAGE_SIZE];
    let hashes = image.chunks_exact(PAGE_SIZE).map(page_digest).collect();
    // Flip one byte of the second page after hashing.
    image[PAGE_SIZE + 7] ^= 0x01;
    let backing = AreaBacking::Store { store: Box::new(SliceStore::new(image)), hashes };

    let mut pager = Pager::new(
        table,
        mem,
        PagerConfig { alloc_range: ALLOC_BASE..ALLOC_BASE + 16 * PAGE_SIZE, max_areas: 4 },
    );
    pager
        .add_core_area(IMAGE_BASE, 2 * PAGE_SIZE, AreaFlags::read_only(), backing)
        .expect("area");
    pager.init().expect("init");
    pager.add_pages(DONOR_VA, 2, true);

    let good = AbortInfo { va: IMAGE_BASE, access: AccessKind::Read, raw: 0 };
    assert_eq!(pager.handle_fault(&good), Ok(FaultOutcome::Loaded));
    let bad = AbortInfo { va: IMAGE_BASE + PAGE_SIZE, access: AccessKind::Read, raw: 0 };
    assert_eq!(
        pager.handle_fault(&bad),
        Err(Fatal::VerificationFailed { area: 0, page: 1 })
    );
    // The tampered page never became readable.
    assert!(pager.translation().lookup(IMAGE_BASE + PAGE_SIZE).is_none());
}

#[test]
#[should_panic(expected = "unrecoverable fault")]
fn dispatch_halts_on_unresolvable_fault() {
    let h = Harness::boot(2, 1);
    let locked = LockedPager::new(h.pager);
    locked.dispatch_fault(&AbortInfo { va: 0xdead_0000, access: AccessKind::Read, raw: 0 });
}

// release_phys drops frames and accounting; the range re-faults as
// zeros through the same virtual addresses.
#[test]
fn released_memory_refaults_as_zeros() {
    let mut h = Harness::boot(4, 1);
    let base = h.pager.alloc(3 * PAGE_SIZE, AreaFlags::read_write()).expect("alloc");
    for page in 0..3 {
        let ai = AbortInfo {
            va: base + page * PAGE_SIZE,
            access: AccessKind::Write,
            raw: 0,
        };
        assert_eq!(h.pager.handle_fault(&ai), Ok(FaultOutcome::ZeroFilled));
    }
    let before = h.pager.stats();
    h.pager.release_phys(base, 3 * PAGE_SIZE);
    let after = h.pager.stats();
    assert_eq!(after.zi_released, before.zi_released + 3);
    assert_eq!(after.npages, before.npages - 3);
    for page in 0..3 {
        assert!(h.pager.translation().lookup(base + page * PAGE_SIZE).is_none());
    }
    // Touch the middle page again.
    let ai = AbortInfo { va: base + PAGE_SIZE, access: AccessKind::Read, raw: 0 };
    assert_eq!(h.pager.handle_fault(&ai), Ok(FaultOutcome::HiddenHit));
    let zeroed = h
        .pager
        .with_resident_page(base + PAGE_SIZE, |buf| buf.iter().all(|b| *b == 0))
        .expect("resident");
    assert!(zeroed);
}

// A release range covering no complete page is a no-op.
#[test]
fn partial_page_release_is_ignored() {
    let mut h = Harness::boot(2, 1);
    let base = h.pager.alloc(PAGE_SIZE, AreaFlags::read_write()).expect("alloc");
    let ai = AbortInfo { va: base, access: AccessKind::Write, raw: 0 };
    h.pager.handle_fault(&ai).expect("fault");
    h.pager.release_phys(base + 1, PAGE_SIZE - 2);
    let stats = h.pager.stats();
    assert_eq!(stats.zi_released, 0);
    assert!(h.pager.translation().lookup(base).is_some());
}

// The clock gives every resident page a grace period before reclaim,
// and hidden pages come back without touching the store.
#[test]
fn eviction_pressure_hides_before_reclaiming() {
    let mut h = Harness::boot(3, 6);
    for page in 0..3 {
        assert_eq!(h.read(IMAGE_BASE + page * PAGE_SIZE), Ok(FaultOutcome::Loaded));
    }
    // The fourth fault sweeps: all three get hidden, the oldest is
    // reclaimed.
    assert_eq!(h.read(IMAGE_BASE + 3 * PAGE_SIZE), Ok(FaultOutcome::Loaded));
    let stats = h.pager.stats();
    assert_eq!(stats.ro_hits, 4);
    assert_eq!(stats.npages, 3);
    // A hidden page restores by remapping alone.
    assert_eq!(h.read(IMAGE_BASE + 2 * PAGE_SIZE), Ok(FaultOutcome::HiddenHit));
    let stats = h.pager.stats();
    assert_eq!(stats.hidden_hits, 1);
    assert_eq!(stats.ro_hits, 4);
    assert!(h.page_matches_image(2));
}

// Serialized faults through the shared lock with lock-free snapshots.
#[test]
fn locked_pager_front_end() {
    let h = Harness::boot(2, 2);
    let locked = LockedPager::new(h.pager);
    let ai = AbortInfo { va: IMAGE_BASE, access: AccessKind::Read, raw: 0 };
    assert_eq!(locked.handle_fault(&ai), Ok(FaultOutcome::Loaded));
    assert_eq!(locked.handle_fault(&ai), Ok(FaultOutcome::Spurious));
    let stats = locked.stats();
    assert_eq!(stats.ro_hits, 1);
    assert_eq!(stats.hidden_hits, 0);
    let mapped = locked.with(|p| p.translation().lookup(IMAGE_BASE).is_some());
    assert!(mapped);
}
