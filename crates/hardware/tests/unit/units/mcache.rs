//! Method cache unit tests.
//!
//! Methods live in a small ideal memory; each method's big-endian byte size
//! sits in the word just below its base.

use patmos_core::common::error::ExceptionKind;
use patmos_core::config::{InstrCacheConfig, MemoryConfig, MemoryKind, MethodCachePolicy};
use patmos_core::core::units::MethodCache;
use patmos_core::soc::MainMemory;

/// Four blocks of 16 bytes.
fn cache_config(policy: MethodCachePolicy) -> InstrCacheConfig {
    InstrCacheConfig {
        policy,
        num_blocks: 4,
        block_bytes: 16,
        init_blocks: 1,
        ..InstrCacheConfig::default()
    }
}

/// Writes a method of `bytes` bytes at `base` (size word at `base - 4`).
fn place_method(mem: &mut MainMemory, base: u32, bytes: u32) {
    mem.write_peek(base - 4, &bytes.to_be_bytes()).unwrap();
    for i in 0..bytes / 4 {
        let word = base + i; // recognizable content
        mem.write_peek(base + i * 4, &word.to_be_bytes()).unwrap();
    }
}

#[test]
fn miss_loads_method_and_fetches_words() {
    let mut mem = MainMemory::ideal(4096);
    place_method(&mut mem, 64, 32);
    let mut cache = MethodCache::new(&cache_config(MethodCachePolicy::Lru));

    assert!(cache.is_available(&mut mem, 64).unwrap());
    assert_eq!(cache.stats.misses, 1);

    let mut iw = [0u32; 2];
    assert!(cache.fetch(64, &mut iw).unwrap());
    assert_eq!(iw, [64, 65]);

    // second dispatch hits
    assert!(cache.is_available(&mut mem, 64).unwrap());
    assert_eq!(cache.stats.hits, 1);
}

/// Loading a method beyond the free capacity evicts the least recently
/// used entries (scenario: resident 2-block method, incoming 3-block one).
#[test]
fn lru_eviction_makes_room() {
    let mut mem = MainMemory::ideal(4096);
    place_method(&mut mem, 64, 32); // A: 2 blocks
    place_method(&mut mem, 256, 48); // B: 3 blocks
    place_method(&mut mem, 512, 32); // C: 2 blocks
    let mut cache = MethodCache::new(&cache_config(MethodCachePolicy::Lru));

    assert!(cache.is_available(&mut mem, 64).unwrap());
    assert!(cache.is_available(&mut mem, 256).unwrap(), "evicts A");

    assert!(!cache.assert_availability(64));
    assert!(cache.assert_availability(256));

    // B is MRU; loading C (2 blocks) must evict B (4 - 3 free < 2)
    assert!(cache.is_available(&mut mem, 512).unwrap());
    assert!(!cache.assert_availability(256));
    assert!(cache.assert_availability(512));
}

/// LRU promotes on dispatch; FIFO keeps insertion order.
#[test]
fn replacement_policy_ordering() {
    for (policy, survivor) in [
        (MethodCachePolicy::Lru, 64u32),  // A was touched, B is the victim
        (MethodCachePolicy::Fifo, 128u32), // A is oldest, A is the victim
    ] {
        let mut mem = MainMemory::ideal(4096);
        place_method(&mut mem, 64, 32); // A: 2 blocks
        place_method(&mut mem, 128, 32); // B: 2 blocks
        place_method(&mut mem, 256, 32); // C: 2 blocks
        let mut cache = MethodCache::new(&cache_config(policy));

        assert!(cache.is_available(&mut mem, 64).unwrap());
        assert!(cache.is_available(&mut mem, 128).unwrap());
        assert!(cache.is_available(&mut mem, 64).unwrap(), "touch A");
        assert!(cache.is_available(&mut mem, 256).unwrap(), "forces eviction");

        assert!(
            cache.assert_availability(survivor),
            "{:?}: expected {:#x} to survive",
            policy,
            survivor
        );
    }
}

#[test]
fn oversized_and_empty_methods_are_rejected() {
    let mut mem = MainMemory::ideal(4096);
    place_method(&mut mem, 64, 80); // 5 blocks > 4
    mem.write_peek(124, &0u32.to_be_bytes()).unwrap(); // zero-size at 128
    let mut cache = MethodCache::new(&cache_config(MethodCachePolicy::Lru));

    let err = cache.is_available(&mut mem, 64).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::CodeExceeded(64)));

    let mut cache = MethodCache::new(&cache_config(MethodCachePolicy::Lru));
    let err = cache.is_available(&mut mem, 128).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::CodeExceeded(128)));
}

#[test]
fn fetch_outside_active_method_is_illegal_pc() {
    let mut mem = MainMemory::ideal(4096);
    place_method(&mut mem, 64, 32);
    let mut cache = MethodCache::new(&cache_config(MethodCachePolicy::Lru));
    cache.is_available(&mut mem, 64).unwrap();

    let mut iw = [0u32; 2];
    let err = cache.fetch(60, &mut iw).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::IllegalPc(64)));
    let err = cache.fetch(96, &mut iw).unwrap_err();
    assert!(matches!(err.kind, ExceptionKind::IllegalPc(64)));
}

#[test]
fn initialize_marks_entry_method_active() {
    let mut mem = MainMemory::ideal(4096);
    mem.write_peek(4, &0xdead_beefu32.to_be_bytes()).unwrap();
    let mut cache = MethodCache::new(&cache_config(MethodCachePolicy::Lru));

    cache.initialize(&mut mem, 4).unwrap();
    assert_eq!(cache.active_base(), 4);
    assert_eq!(cache.active_bytes(), 16, "one init block");

    let mut iw = [0u32; 2];
    cache.fetch(4, &mut iw).unwrap();
    assert_eq!(iw[0], 0xdead_beef);
}

/// Over delayed memory the miss state machine is re-entered each cycle,
/// spending cycles first on the size read, then on the transfer.
#[test]
fn miss_state_machine_advances_across_cycles() {
    let mem_config = MemoryConfig {
        kind: MemoryKind::Fixed,
        size: 4096,
        burst_bytes: 16,
        burst_ticks: 2,
        read_delay_ticks: 0,
        ..MemoryConfig::default()
    };
    let mut mem = MainMemory::new(&mem_config);
    mem.write_peek(60, &32u32.to_be_bytes()).unwrap();
    let mut cache = MethodCache::new(&cache_config(MethodCachePolicy::Lru));

    let mut cycles = 0;
    while !cache.is_available(&mut mem, 64).unwrap() {
        mem.tick();
        cache.tick();
        cycles += 1;
        assert!(cycles < 100, "method load never completed");
    }
    // size word: one burst (2 ticks); body: two bursts (4 ticks)
    assert_eq!(cycles, 6);
    assert_eq!(cache.stats.misses, 1);
    assert_eq!(cache.stats.stall_cycles, 6);
    assert_eq!(cache.stats.blocks_transferred, 2);
}
