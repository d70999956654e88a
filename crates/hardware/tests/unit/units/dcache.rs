//! Data cache unit tests.
//!
//! The set-associative cache keeps tags only; data lives in the backing
//! memory. With 64 bytes, 16-byte lines, and 2 ways there are 2 sets:
//! set = (addr / 16) % 2, tag = addr / 32.

use patmos_core::config::{DataCacheConfig, DataCacheKind, MemoryConfig, MemoryKind};
use patmos_core::core::units::DataCache;
use patmos_core::soc::MainMemory;

fn lru2_config() -> DataCacheConfig {
    DataCacheConfig { kind: DataCacheKind::Lru2, size_bytes: 64, line_bytes: 16 }
}

fn ideal_memory() -> MainMemory {
    let mut mem = MainMemory::ideal(4096);
    // deterministic contents for read checks
    for i in 0..16 {
        mem.write_peek(i * 4, &(i as u32).to_be_bytes()).unwrap();
    }
    mem
}

#[test]
fn cold_miss_then_warm_hit() {
    let mut mem = ideal_memory();
    let mut cache = DataCache::new(&lru2_config());
    let mut buf = [0u8; 4];

    assert!(cache.read(&mut mem, 0x10, &mut buf).unwrap());
    assert_eq!(u32::from_be_bytes(buf), 4);
    assert_eq!(cache.stats().read_misses, 1);

    assert!(cache.read(&mut mem, 0x14, &mut buf).unwrap());
    assert_eq!(cache.stats().read_hits, 1, "same line hits");
    assert_eq!(cache.stats().read_misses, 1);
}

#[test]
fn lru_eviction_on_set_conflict() {
    let mut mem = ideal_memory();
    let mut cache = DataCache::new(&lru2_config());
    let mut buf = [0u8; 4];

    // three lines mapping to set 0: addresses 0, 32, 64
    cache.read(&mut mem, 0, &mut buf).unwrap();
    cache.read(&mut mem, 32, &mut buf).unwrap();
    assert!(cache.contains(0));
    assert!(cache.contains(32));

    // touch line 0 so line 32 becomes the LRU victim
    cache.read(&mut mem, 0, &mut buf).unwrap();
    cache.read(&mut mem, 64, &mut buf).unwrap();

    assert!(cache.contains(0), "recently used line survives");
    assert!(!cache.contains(32), "LRU line evicted");
    assert!(cache.contains(64));
}

#[test]
fn write_through_updates_memory_and_counters() {
    let mut mem = ideal_memory();
    let mut cache = DataCache::new(&lru2_config());
    let mut buf = [0u8; 4];

    assert!(cache.write(&mut mem, 0x20, &[1, 2, 3, 4]).unwrap());
    assert_eq!(cache.stats().write_misses, 1, "no write allocate");
    assert!(!cache.contains(0x20));

    cache.read(&mut mem, 0x20, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4], "write went through to memory");

    assert!(cache.write(&mut mem, 0x20, &[5, 6, 7, 8]).unwrap());
    assert_eq!(cache.stats().write_hits, 1, "line now resident");
}

/// A miss over delayed memory reports not-ready until the line fill
/// completes, and is counted exactly once.
#[test]
fn miss_stalls_until_line_fill_completes() {
    let config = MemoryConfig {
        kind: MemoryKind::Fixed,
        size: 4096,
        burst_bytes: 16,
        burst_ticks: 4,
        read_delay_ticks: 0,
        ..MemoryConfig::default()
    };
    let mut mem = MainMemory::new(&config);
    let mut cache = DataCache::new(&lru2_config());
    let mut buf = [0u8; 4];

    let mut rounds = 0;
    while !cache.read(&mut mem, 0x40, &mut buf).unwrap() {
        mem.tick();
        rounds += 1;
        assert!(rounds < 100, "line fill never completed");
    }
    assert_eq!(rounds, 4, "one burst for the 16-byte line");
    assert_eq!(cache.stats().read_misses, 1, "retries count one miss");
    assert!(cache.contains(0x40));
}

#[test]
fn bypass_kind_counts_memory_accesses() {
    let mut mem = ideal_memory();
    let config = DataCacheConfig { kind: DataCacheKind::No, ..lru2_config() };
    let mut cache = DataCache::new(&config);
    let mut buf = [0u8; 4];

    assert!(cache.read(&mut mem, 0, &mut buf).unwrap());
    assert!(cache.read(&mut mem, 0, &mut buf).unwrap());
    assert_eq!(cache.stats().read_misses, 2, "every access goes to memory");
    assert!(!cache.contains(0));
}
