//! Main memory model unit tests.
//!
//! Latency formulas and queue behavior of the fixed-delay, variable-burst,
//! and TDM models, posted-write semantics, and the uninitialized-read
//! policies.

use patmos_core::common::error::ExceptionKind;
use patmos_core::config::{MemCheck, MemoryConfig, MemoryKind};
use patmos_core::soc::MainMemory;

fn fixed_config() -> MemoryConfig {
    MemoryConfig {
        kind: MemoryKind::Fixed,
        size: 4096,
        burst_bytes: 16,
        burst_ticks: 8,
        read_delay_ticks: 2,
        posted_writes: 0,
        ..MemoryConfig::default()
    }
}

// ── Fixed delay ───────────────────────────────────────────────

/// A 4-byte load pays one burst plus the read delay: 8 + 2 cycles.
#[test]
fn fixed_delay_read_latency() {
    let mut mem = MainMemory::new(&fixed_config());
    let mut buf = [0u8; 4];

    assert!(!mem.read(0, &mut buf, false).unwrap(), "first call queues");
    for _ in 0..9 {
        mem.tick();
        assert!(!mem.read(0, &mut buf, false).unwrap());
    }
    mem.tick();
    assert!(mem.read(0, &mut buf, false).unwrap(), "ready after 10 ticks");
    assert!(mem.is_ready());
}

/// A request crossing a burst boundary pays two bursts.
#[test]
fn fixed_delay_two_burst_read() {
    let mut mem = MainMemory::new(&fixed_config());

    // [12, 20) straddles the 16-byte burst boundary: 2 bursts + delay = 18
    let mut wide = [0u8; 8];
    assert!(!mem.read(12, &mut wide, false).unwrap());
    for _ in 0..17 {
        mem.tick();
        assert!(!mem.read(12, &mut wide, false).unwrap());
    }
    mem.tick();
    assert!(mem.read(12, &mut wide, false).unwrap());
}

/// A retried request is matched in the queue, not re-created.
#[test]
fn fixed_delay_requests_deduplicate() {
    let mut mem = MainMemory::new(&fixed_config());
    let mut buf = [0u8; 4];

    for _ in 0..5 {
        assert!(!mem.read(0, &mut buf, false).unwrap());
    }
    assert_eq!(mem.stats().unwrap().reads, 1, "one request despite retries");
}

/// Non-posted writes stall until the request completes, then commit data.
#[test]
fn fixed_delay_write_completes_after_latency() {
    let mut mem = MainMemory::new(&fixed_config());

    assert!(!mem.write(32, &[1, 2, 3, 4]).unwrap());
    for _ in 0..10 {
        mem.tick();
    }
    assert!(mem.write(32, &[1, 2, 3, 4]).unwrap());

    let mut buf = [0u8; 4];
    mem.read_peek(32, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);
}

// ── Posted writes ─────────────────────────────────────────────

/// Posted writes are accepted immediately and drain through `tick`; cycles
/// where the queue holds only posted writes count as hidden.
#[test]
fn posted_writes_are_hidden() {
    let mut config = fixed_config();
    config.posted_writes = 2;
    let mut mem = MainMemory::new(&config);

    assert!(mem.write(0, &[9, 9, 9, 9]).unwrap(), "accepted at once");
    assert!(!mem.is_ready());

    // data is already visible
    let mut buf = [0u8; 4];
    mem.read_peek(0, &mut buf).unwrap();
    assert_eq!(buf, [9, 9, 9, 9]);

    // posted write pays one burst, no read delay: 8 ticks to drain
    for _ in 0..8 {
        mem.tick();
    }
    assert!(mem.is_ready());
    assert_eq!(mem.stats().unwrap().posted_write_cycles, 8);
}

/// Writes beyond the posting depth are not accepted until the queue drains.
#[test]
fn posted_writes_saturate_at_depth() {
    let mut config = fixed_config();
    config.posted_writes = 1;
    let mut mem = MainMemory::new(&config);

    assert!(mem.write(0, &[1, 1, 1, 1]).unwrap());
    assert!(!mem.write(64, &[2, 2, 2, 2]).unwrap(), "queue saturated");

    for _ in 0..8 {
        mem.tick();
    }
    assert!(mem.write(64, &[2, 2, 2, 2]).unwrap(), "accepted after drain");
}

// ── Variable burst ────────────────────────────────────────────

/// Within one page: one burst cost plus one cycle per extra word.
#[test]
fn variable_burst_single_page() {
    let mut config = fixed_config();
    config.kind = MemoryKind::Variable;
    config.page_bytes = 64;
    config.read_delay_ticks = 0;
    let mut mem = MainMemory::new(&config);

    // aligned size 32 in one page: 8 + (32 - 16) / 4 = 12 ticks
    let mut buf = [0u8; 32];
    assert!(!mem.read(0, &mut buf, false).unwrap());
    for _ in 0..11 {
        mem.tick();
        assert!(!mem.read(0, &mut buf, false).unwrap());
    }
    mem.tick();
    assert!(mem.read(0, &mut buf, false).unwrap());
}

/// Spanning two pages pays the burst cost twice.
#[test]
fn variable_burst_page_crossing() {
    let mut config = fixed_config();
    config.kind = MemoryKind::Variable;
    config.page_bytes = 64;
    config.read_delay_ticks = 0;
    let mut mem = MainMemory::new(&config);

    // [48, 80) touches pages 0 and 1: 2 * 8 + (32 - 32) / 4 = 16 ticks
    let mut buf = [0u8; 32];
    assert!(!mem.read(48, &mut buf, false).unwrap());
    for _ in 0..15 {
        mem.tick();
        assert!(!mem.read(48, &mut buf, false).unwrap());
    }
    mem.tick();
    assert!(mem.read(48, &mut buf, false).unwrap());
}

// ── TDM ───────────────────────────────────────────────────────

/// The queue head only advances at this core's slot within the round.
#[test]
fn tdm_advances_in_own_slot() {
    let mut config = fixed_config();
    config.kind = MemoryKind::Tdm;
    config.num_cores = 2;
    config.burst_ticks = 4;
    config.read_delay_ticks = 0;
    config.refresh_ticks = 0;
    let mut mem = MainMemory::new(&config);

    let mut buf = [0u8; 4];
    assert!(!mem.read(0, &mut buf, false).unwrap());

    // slot end of core 0 is at round counter 4
    for _ in 0..3 {
        mem.tick();
        assert!(!mem.read(0, &mut buf, false).unwrap());
    }
    mem.tick();
    assert!(mem.read(0, &mut buf, false).unwrap());
}

// ── Bounds and initialization checks ──────────────────────────

#[test]
fn out_of_bounds_access_is_unmapped() {
    let mut mem = MainMemory::ideal(256);
    let mut buf = [0u8; 4];
    let err = mem.read(256, &mut buf, false).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::Unmapped(256)));
}

#[test]
fn uninitialized_read_fails_under_error_policy() {
    let mut config = MemoryConfig { size: 4096, check: MemCheck::Error, ..MemoryConfig::default() };
    config.kind = MemoryKind::Ideal;
    let mut mem = MainMemory::new(&config);

    let mut buf = [0u8; 4];
    let err = mem.read(0x100, &mut buf, false).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::IllegalAccess(_)));

    mem.write(0x100, &[1, 2, 3, 4]).unwrap();
    assert!(mem.read(0x100, &mut buf, false).unwrap());
    assert_eq!(buf, [1, 2, 3, 4]);
}

/// The address-only policy triggers only when every byte is uninitialized.
#[test]
fn address_only_policy_tolerates_partial_initialization() {
    let mut config = MemoryConfig {
        size: 4096,
        check: MemCheck::ErrorAddr,
        ..MemoryConfig::default()
    };
    config.kind = MemoryKind::Ideal;
    let mut mem = MainMemory::new(&config);

    mem.write(0x200, &[5, 6]).unwrap();
    let mut buf = [0u8; 4];
    assert!(mem.read(0x200, &mut buf, false).is_ok(), "partially written");

    let err = mem.read(0x300, &mut buf, false).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::IllegalAccess(_)));
}

/// Peeks never fail the initialization check.
#[test]
fn peeks_ignore_initialization_policy() {
    let mut config = MemoryConfig { size: 4096, check: MemCheck::Error, ..MemoryConfig::default() };
    config.kind = MemoryKind::Ideal;
    let mut mem = MainMemory::new(&config);

    let mut buf = [0u8; 4];
    assert!(mem.read_peek(0x100, &mut buf).is_ok());
}
