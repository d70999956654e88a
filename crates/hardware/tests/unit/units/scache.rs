//! Stack cache unit tests.
//!
//! A 4-block cache of 4-byte blocks with a 16-block total limit. The stack
//! top register tracks the lowest address of the spilled region.

use patmos_core::common::data::Uword;
use patmos_core::common::error::ExceptionKind;
use patmos_core::config::{StackCacheConfig, StackCacheKind};
use patmos_core::core::units::StackCache;
use patmos_core::soc::MainMemory;

const TOP: Uword = 0x200;

fn block_cache() -> StackCache {
    StackCache::new(&StackCacheConfig {
        kind: StackCacheKind::Block,
        num_blocks: 4,
        block_bytes: 4,
        total_blocks: 16,
    })
}

/// A single reservation of six blocks on a four-block cache keeps four
/// resident and spills two.
#[test]
fn oversized_reservation_spills_immediately() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    assert!(cache.reserve(&mut mem, 24, &mut top).unwrap());
    assert_eq!(cache.reserved_blocks(), 4);
    assert_eq!(cache.spilled_blocks(), 2);
    assert_eq!(top, TOP - 8);
}

/// Reserving six blocks in two steps spills the two oldest blocks just
/// below the old stack top and lowers the top accordingly.
#[test]
fn reserve_spills_overflow_blocks() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    assert!(cache.reserve(&mut mem, 16, &mut top).unwrap());
    assert_eq!(cache.reserved_blocks(), 4);

    // mark the oldest block so the spill is recognizable
    cache.write(12, &[0xaa, 0xbb, 0xcc, 0xdd]).unwrap();

    assert!(cache.reserve(&mut mem, 8, &mut top).unwrap());
    assert_eq!(cache.reserved_blocks(), 4);
    assert_eq!(cache.spilled_blocks(), 2);
    assert_eq!(top, TOP - 8, "top lowered by the spilled bytes");

    let mut spilled = [0u8; 4];
    mem.read_peek(TOP - 8, &mut spilled).unwrap();
    assert_eq!(spilled, [0xaa, 0xbb, 0xcc, 0xdd]);
}

/// Ensuring more than is resident fills the missing blocks back and raises
/// the top; the data survives because the cache content is never erased.
#[test]
fn ensure_fills_spilled_blocks() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    cache.reserve(&mut mem, 16, &mut top).unwrap();
    cache.write(12, &[1, 2, 3, 4]).unwrap();
    cache.reserve(&mut mem, 8, &mut top).unwrap(); // spills two blocks
    cache.free(8, &mut top).unwrap(); // resident back to two blocks
    assert_eq!(cache.reserved_blocks(), 2);
    assert_eq!(cache.spilled_blocks(), 2);

    assert!(cache.ensure(&mut mem, 16, &mut top).unwrap());
    assert_eq!(cache.reserved_blocks(), 4);
    assert_eq!(cache.spilled_blocks(), 0);
    assert_eq!(top, TOP, "top restored after the fill");

    let mut buf = [0u8; 4];
    cache.read(12, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);
}

/// Ensuring no more than is resident is free of charge.
#[test]
fn ensure_resident_is_noop() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    cache.reserve(&mut mem, 12, &mut top).unwrap();
    let spilled_before = cache.spilled_blocks();
    assert!(cache.ensure(&mut mem, 12, &mut top).unwrap());
    assert_eq!(cache.spilled_blocks(), spilled_before);
    assert_eq!(top, TOP);
}

/// Freeing more than is resident drops spilled blocks without memory
/// traffic, raises the top, and counts an emptying free.
#[test]
fn emptying_free_drops_spilled_blocks() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    cache.reserve(&mut mem, 16, &mut top).unwrap();
    cache.reserve(&mut mem, 8, &mut top).unwrap(); // spilled = 2
    cache.free(8, &mut top).unwrap(); // resident = 2, spilled = 2
    let top_before = top;

    assert!(cache.free(12, &mut top).unwrap()); // 3 blocks > resident
    assert_eq!(cache.reserved_blocks(), 0);
    assert_eq!(cache.spilled_blocks(), 1);
    assert_eq!(top, top_before + 4);
    assert_eq!(cache.stats().unwrap().free_empty, 1);
}

/// A free within the resident portion leaves the spilled count unchanged.
#[test]
fn free_within_resident_keeps_spilled() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    cache.reserve(&mut mem, 16, &mut top).unwrap();
    cache.reserve(&mut mem, 8, &mut top).unwrap();
    let spilled = cache.spilled_blocks();
    let top_before = top;

    cache.free(8, &mut top).unwrap();
    assert_eq!(cache.spilled_blocks(), spilled);
    assert_eq!(top, top_before);
}

#[test]
fn total_limit_bounds_reserved_plus_spilled() {
    let mut mem = MainMemory::ideal(0x1000);

    // a single reservation beyond the 16-block total is rejected
    let mut cache = block_cache();
    let mut top = TOP;
    let err = cache.reserve(&mut mem, 17 * 4, &mut top).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::StackExceeded(_)));

    // grow until resident + spilled reach the total, then one more
    let mut cache = block_cache();
    let mut top = TOP;
    for _ in 0..4 {
        cache.reserve(&mut mem, 16, &mut top).unwrap();
        assert!(cache.reserved_blocks() + cache.spilled_blocks() <= 16);
    }
    assert_eq!(cache.reserved_blocks() + cache.spilled_blocks(), 16);
    let err = cache.reserve(&mut mem, 16, &mut top).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::StackExceeded(_)));
}

#[test]
fn access_beyond_resident_slice_fails() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    cache.reserve(&mut mem, 16, &mut top).unwrap();
    let mut buf = [0u8; 4];
    assert!(cache.read(12, &mut buf).is_ok());

    let err = cache.read(16, &mut buf).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::StackExceeded(_)));
    let err = cache.write(16, &buf).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::StackExceeded(_)));
}

/// Reads and writes address the stack relative to its top: offset 0 is the
/// most recently reserved word.
#[test]
fn top_relative_addressing() {
    let mut mem = MainMemory::ideal(0x1000);
    let mut cache = block_cache();
    let mut top = TOP;

    cache.reserve(&mut mem, 8, &mut top).unwrap();
    cache.write(0, &[1, 1, 1, 1]).unwrap();
    cache.write(4, &[2, 2, 2, 2]).unwrap();

    // reserving more moves older data away from the top
    cache.reserve(&mut mem, 4, &mut top).unwrap();
    let mut buf = [0u8; 4];
    cache.read(4, &mut buf).unwrap();
    assert_eq!(buf, [1, 1, 1, 1]);
    cache.read(8, &mut buf).unwrap();
    assert_eq!(buf, [2, 2, 2, 2]);
}
