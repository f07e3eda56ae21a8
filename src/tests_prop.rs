// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for area validation and page math
//! OWNERS: @kernel-mm-team
//! NOTE: Tests only; no kernel logic. Ensures registration validation and
//!       alignment helpers are sound across the whole input space.
//!
//! TEST_SCOPE:
//!   - align_down/align_up idempotence and ordering
//!   - Area::new geometry rejection for unaligned input
//!   - AreaFlags W^X coupling
//!   - AreaRegistry non-mutation on rejected registration
//!
//! TEST_SCENARIOS:
//!   - alignment_brackets_the_address(): down <= addr <= up, both aligned
//!   - unaligned_geometry_is_rejected(): any misaligned base or size fails
//!   - exec_flags_never_pair_with_write(): flags constructor enforces W^X
//!   - rejected_registration_leaves_registry_unchanged(): overlap keeps len

use proptest::prelude::*;

use crate::area::{Area, AreaBacking, AreaFlags, AreaRegistry, Permission};
use crate::page::{align_down, align_up, is_page_aligned, PAGE_SIZE};

fn arb_page_count() -> impl Strategy<Value = usize> {
    1usize..64
}

proptest! {
    #[test]
    fn alignment_brackets_the_address(addr in any::<usize>()) {
        let down = align_down(addr);
        let up = align_up(addr);
        prop_assert!(is_page_aligned(down));
        prop_assert!(is_page_aligned(up));
        prop_assert!(down <= addr);
        prop_assert!(up >= down);
        prop_assert_eq!(align_down(down), down);
        prop_assert_eq!(align_up(up), up);
        if is_page_aligned(addr) {
            prop_assert_eq!(down, addr);
            prop_assert_eq!(up, addr);
        }
    }

    #[test]
    fn unaligned_geometry_is_rejected(
        base in any::<usize>(),
        pages in arb_page_count(),
        off in 1usize..PAGE_SIZE,
    ) {
        let size = pages * PAGE_SIZE;
        let unaligned_base = align_down(base).wrapping_add(off);
        prop_assert!(
            Area::new(unaligned_base, size, AreaFlags::read_write(), AreaBacking::Zero).is_err()
        );
        prop_assert!(
            Area::new(0, size + off, AreaFlags::read_write(), AreaBacking::Zero).is_err()
        );
    }

    #[test]
    fn exec_flags_never_pair_with_write(exec in any::<bool>(), lock in any::<bool>()) {
        let rw = AreaFlags::new(Permission::ReadWrite, exec, lock);
        prop_assert_eq!(rw.is_ok(), !exec);
        let ro = AreaFlags::new(Permission::ReadOnly, exec, lock).unwrap();
        prop_assert_eq!(ro.is_executable(), exec);
        prop_assert_eq!(ro.locks_on_fault(), lock);
    }

    #[test]
    fn rejected_registration_leaves_registry_unchanged(
        pages in arb_page_count(),
        overlap_page in 0usize..64,
    ) {
        prop_assume!(overlap_page < pages);
        let mut registry = AreaRegistry::with_capacity(4);
        let base = 0x10_0000;
        let first = Area::new(base, pages * PAGE_SIZE, AreaFlags::read_write(), AreaBacking::Zero)
            .unwrap();
        registry.register(first).unwrap();
        let clash = Area::new(
            base + overlap_page * PAGE_SIZE,
            PAGE_SIZE,
            AreaFlags::read_write(),
            AreaBacking::Zero,
        )
        .unwrap();
        prop_assert!(registry.register(clash).is_err());
        prop_assert_eq!(registry.len(), 1);
    }
}
