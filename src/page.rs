// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page geometry and alignment helpers.

use static_assertions::const_assert;

/// Size of a single page in bytes.
pub const PAGE_SIZE: usize = 4096;

const_assert!(PAGE_SIZE.is_power_of_two());

/// Rounds `addr` down to the containing page boundary.
pub const fn align_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// Rounds `addr` up to the next page boundary, saturating at the last
/// aligned address.
pub fn align_up(addr: usize) -> usize {
    let rem = addr % PAGE_SIZE;
    if rem == 0 {
        addr
    } else {
        addr.checked_add(PAGE_SIZE - rem).unwrap_or(usize::MAX & !(PAGE_SIZE - 1))
    }
}

/// Returns true if `addr` sits on a page boundary.
pub const fn is_page_aligned(addr: usize) -> bool {
    addr % PAGE_SIZE == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_down_clears_offset_bits() {
        assert_eq!(align_down(0), 0);
        assert_eq!(align_down(PAGE_SIZE - 1), 0);
        assert_eq!(align_down(PAGE_SIZE + 1), PAGE_SIZE);
    }

    #[test]
    fn align_up_rounds_to_next_boundary() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_up(usize::MAX), usize::MAX & !(PAGE_SIZE - 1));
    }

    #[test]
    fn aligned_predicate_matches_helpers() {
        assert!(is_page_aligned(0));
        assert!(is_page_aligned(3 * PAGE_SIZE));
        assert!(!is_page_aligned(PAGE_SIZE + 8));
    }
}
