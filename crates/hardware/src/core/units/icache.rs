//! Instruction cache front ends.
//!
//! The IF stage fetches two big-endian words per cycle through one of three
//! front ends: an ideal method cache (all methods magically resident), a
//! real method cache, or an adapter that presents a data cache as a
//! conventional instruction cache by issuing two consecutive word reads per
//! fetch.

use crate::common::data::{uword_from_be, Uword};
use crate::common::error::SimResult;
use crate::config::{InstrCacheConfig, InstrCacheKind, MethodCachePolicy};
use crate::core::pipeline::NUM_SLOTS;
use crate::core::units::dcache::DataCache;
use crate::core::units::mcache::MethodCache;
use crate::soc::MainMemory;

/// Fetch counters of the data-cache-backed front end.
#[derive(Debug, Default, Clone)]
pub struct FetchStats {
    /// Fetches in which every slot missed.
    pub all_miss: u64,
    /// Fetches with a single miss in the first slot.
    pub first_miss: u64,
    /// Fetches with a single miss in a later slot.
    pub succ_miss: u64,
    /// Fetches without misses.
    pub hits: u64,
}

/// An instruction cache built from a backing data cache.
///
/// A fetch issues one word read per slot; the fetch is ready when both
/// reads are. Partial progress is kept across stall cycles.
pub struct WrappedInstrCache {
    /// The backing data cache, owned by this front end.
    pub dcache: DataCache,
    fetched: usize,
    words: [Uword; NUM_SLOTS],
    miss: [bool; NUM_SLOTS],
    /// Fetch counters.
    pub stats: FetchStats,
}

impl WrappedInstrCache {
    fn new(config: &InstrCacheConfig) -> Self {
        Self {
            dcache: DataCache::new(&config.backing),
            fetched: 0,
            words: [0; NUM_SLOTS],
            miss: [false; NUM_SLOTS],
            stats: FetchStats::default(),
        }
    }

    fn fetch(
        &mut self,
        mem: &mut MainMemory,
        address: Uword,
        iw: &mut [Uword; NUM_SLOTS],
    ) -> SimResult<bool> {
        while self.fetched < NUM_SLOTS {
            let mut bytes = [0u8; 4];
            let slot_address = address + 4 * self.fetched as Uword;
            if self.dcache.read(mem, slot_address, &mut bytes)? {
                self.words[self.fetched] = uword_from_be(&bytes);
                self.fetched += 1;
            } else {
                self.miss[self.fetched] = true;
                return Ok(false);
            }
        }

        match (self.miss[0], self.miss[1]) {
            (true, true) => self.stats.all_miss += 1,
            (true, false) => self.stats.first_miss += 1,
            (false, true) => self.stats.succ_miss += 1,
            (false, false) => self.stats.hits += 1,
        }
        self.fetched = 0;
        self.miss = [false; NUM_SLOTS];
        *iw = self.words;
        Ok(true)
    }
}

/// The instruction-fetch front end; the concrete kind is fixed at
/// construction.
pub enum InstrCache {
    /// Ideal method cache: every method is always resident.
    IdealMethod,
    /// Real method cache with LRU or FIFO replacement.
    Method(MethodCache),
    /// Data-cache-backed instruction cache.
    Wrapped(WrappedInstrCache),
}

impl InstrCache {
    /// Builds a front end from its configuration.
    pub fn new(config: &InstrCacheConfig) -> Self {
        match (config.kind, config.policy) {
            (InstrCacheKind::ICache, _) => InstrCache::Wrapped(WrappedInstrCache::new(config)),
            (InstrCacheKind::MCache, MethodCachePolicy::Ideal) => InstrCache::IdealMethod,
            (InstrCacheKind::MCache, _) => InstrCache::Method(MethodCache::new(config)),
        }
    }

    /// Loads the entry method before the first instruction executes.
    pub fn initialize(&mut self, mem: &mut MainMemory, address: Uword) -> SimResult<()> {
        match self {
            InstrCache::Method(mc) => mc.initialize(mem, address),
            _ => Ok(()),
        }
    }

    /// Fetches the bundle at `address`; `true` when both words are valid.
    pub fn fetch(
        &mut self,
        mem: &mut MainMemory,
        address: Uword,
        iw: &mut [Uword; NUM_SLOTS],
    ) -> SimResult<bool> {
        match self {
            InstrCache::IdealMethod => {
                let mut bytes = [0u8; 8];
                mem.read_peek(address, &mut bytes)?;
                iw[0] = uword_from_be(&bytes[0..4]);
                iw[1] = uword_from_be(&bytes[4..8]);
                Ok(true)
            }
            InstrCache::Method(mc) => mc.fetch(address, iw),
            InstrCache::Wrapped(wc) => wc.fetch(mem, address, iw),
        }
    }

    /// Ensures the method at `address` is resident, starting a load if not.
    pub fn load_method(&mut self, mem: &mut MainMemory, address: Uword) -> SimResult<bool> {
        match self {
            InstrCache::Method(mc) => mc.is_available(mem, address),
            _ => Ok(true),
        }
    }

    /// Pure residency check, used by the `dispatch` fast path.
    pub fn is_available(&self, address: Uword) -> bool {
        match self {
            InstrCache::Method(mc) => mc.assert_availability(address),
            _ => true,
        }
    }

    /// Advances the front end by one cycle.
    pub fn tick(&mut self) {
        if let InstrCache::Method(mc) = self {
            mc.tick();
        }
    }

    /// The method cache, when this front end has one.
    pub fn method_cache(&self) -> Option<&MethodCache> {
        match self {
            InstrCache::Method(mc) => Some(mc),
            _ => None,
        }
    }

    /// Dumps the front-end state for the `all` debug format.
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        match self {
            InstrCache::IdealMethod => writeln!(out, " ideal"),
            InstrCache::Method(mc) => mc.dump(out),
            InstrCache::Wrapped(wc) => wc.dcache.dump(out),
        }
    }
}
