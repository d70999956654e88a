//! Method cache.
//!
//! Program text is cached a whole method at a time, keyed by the method's
//! base address. A miss walks a three-phase state machine: `Size` reads the
//! method's byte length from the word just below its base, `Transfer` bulk-
//! loads the method body, and the machine is re-entered from the caller
//! every cycle until it reports the method available. Entries own one byte
//! buffer each, allocated at construction and reused across evictions, so
//! steady-state misses allocate nothing.

use std::collections::BTreeMap;

use crate::common::data::{uword_from_be, Uword};
use crate::common::error::{SimException, SimResult};
use crate::config::{InstrCacheConfig, MethodCachePolicy};
use crate::core::pipeline::NUM_SLOTS;
use crate::soc::MainMemory;

/// Transfer and hit/miss counters of the method cache.
#[derive(Debug, Default, Clone)]
pub struct MethodCacheStats {
    /// Blocks transferred from main memory.
    pub blocks_transferred: u64,
    /// Largest single-method block transfer.
    pub max_blocks_transferred: u64,
    /// Bytes transferred from main memory.
    pub bytes_transferred: u64,
    /// Largest single-method byte transfer.
    pub max_bytes_transferred: u64,
    /// Dispatches that found the method resident.
    pub hits: u64,
    /// Dispatches that had to load the method.
    pub misses: u64,
    /// Cycles spent with a load in progress.
    pub stall_cycles: u64,
    /// Per-method (hits, misses), keyed by base address.
    pub per_method: BTreeMap<Uword, (u64, u64)>,
}

/// Phases of fetching a method from memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// No load in progress; dispatch requests are served directly.
    Idle,
    /// The method's size word is being read from `base - 4`.
    Size,
    /// The method's instructions are being transferred from memory.
    Transfer,
}

/// Bookkeeping for one cached method.
struct MethodEntry {
    /// The method's instructions; capacity equals the whole cache.
    buf: Vec<u8>,
    /// Base address of the method.
    address: Uword,
    /// Blocks occupied by the method.
    num_blocks: usize,
    /// Valid instruction bytes of the method.
    num_bytes: Uword,
}

impl MethodEntry {
    fn update(&mut self, address: Uword, num_blocks: usize, num_bytes: Uword) {
        self.address = address;
        self.num_blocks = num_blocks;
        self.num_bytes = num_bytes;
    }
}

/// A method cache with LRU or FIFO replacement.
///
/// Entries are ordered by age with the most recently used at the back; the
/// active window is the last `active_methods` entries. On equal recency the
/// entry inserted most recently wins.
pub struct MethodCache {
    policy: MethodCachePolicy,
    num_blocks: usize,
    block_bytes: usize,
    init_blocks: usize,
    phase: Phase,
    transfer_blocks: usize,
    transfer_bytes: Uword,
    entries: Vec<MethodEntry>,
    active_methods: usize,
    active_blocks: usize,
    /// Entry the fetch port reads from (FIFO keeps the last matched method;
    /// LRU always fetches from the most recently used entry).
    active_idx: usize,
    /// Transfer and hit/miss counters.
    pub stats: MethodCacheStats,
}

impl MethodCache {
    /// Builds a method cache from its configuration.
    pub fn new(config: &InstrCacheConfig) -> Self {
        let num_blocks = config.num_blocks.max(1);
        let block_bytes = config.block_bytes.max(4);
        let capacity = num_blocks * block_bytes;
        let entries = (0..num_blocks)
            .map(|_| MethodEntry { buf: vec![0; capacity], address: 0, num_blocks: 0, num_bytes: 0 })
            .collect();
        Self {
            policy: config.policy,
            num_blocks,
            block_bytes,
            init_blocks: config.init_blocks.min(num_blocks).max(1),
            phase: Phase::Idle,
            transfer_blocks: 0,
            transfer_bytes: 0,
            entries,
            active_methods: 0,
            active_blocks: 0,
            active_idx: num_blocks - 1,
            stats: MethodCacheStats::default(),
        }
    }

    /// Loads the entry method before the first instruction executes.
    ///
    /// Reads `init_blocks` blocks from `address` into the most recently used
    /// slot and marks that one method active.
    pub fn initialize(&mut self, mem: &mut MainMemory, address: Uword) -> SimResult<()> {
        debug_assert!(self.active_methods == 0 && self.active_blocks == 0);
        let bytes = self.init_blocks * self.block_bytes;
        let entry = self.entries.last_mut().expect("method cache has entries");
        mem.read_peek(address, &mut entry.buf[..bytes])?;
        entry.update(address, self.init_blocks, bytes as Uword);
        self.active_blocks = self.init_blocks;
        self.active_methods = 1;
        self.active_idx = self.num_blocks - 1;
        Ok(())
    }

    /// Index range of the active entries.
    fn active_window(&self) -> std::ops::Range<usize> {
        self.num_blocks - self.active_methods..self.num_blocks
    }

    /// Looks a method up and applies the policy's ordering update.
    fn lookup(&mut self, address: Uword) -> bool {
        let window = self.active_window();
        for i in window.rev() {
            if self.entries[i].address == address {
                match self.policy {
                    MethodCachePolicy::Lru => {
                        // promote to the most recently used position
                        let entry = self.entries.remove(i);
                        self.entries.push(entry);
                        self.active_idx = self.num_blocks - 1;
                    }
                    _ => self.active_idx = i,
                }
                return true;
            }
        }
        false
    }

    /// Checks whether the method at `address` is resident, starting a load
    /// if it is not.
    ///
    /// Re-entered from the caller every cycle; each memory-blocking phase
    /// returns `false` until its transfer completes.
    pub fn is_available(&mut self, mem: &mut MainMemory, address: Uword) -> SimResult<bool> {
        loop {
            match self.phase {
                Phase::Idle => {
                    debug_assert!(self.transfer_blocks == 0 && self.transfer_bytes == 0);
                    if self.lookup(address) {
                        self.stats.hits += 1;
                        self.stats.per_method.entry(address).or_default().0 += 1;
                        return Ok(true);
                    }
                    self.stats.misses += 1;
                    self.stats.per_method.entry(address).or_default().1 += 1;
                    self.phase = Phase::Size;
                }
                Phase::Size => {
                    let mut word = [0u8; 4];
                    if !mem.read(address.wrapping_sub(4), &mut word, true)? {
                        return Ok(false);
                    }
                    self.transfer_bytes = uword_from_be(&word);
                    self.transfer_blocks =
                        (self.transfer_bytes as usize).div_ceil(self.block_bytes);

                    if self.transfer_blocks == 0 || self.transfer_blocks > self.num_blocks {
                        return Err(SimException::code_exceeded(address));
                    }

                    // evict least recently used methods until the new one fits
                    while self.active_blocks + self.transfer_blocks > self.num_blocks {
                        debug_assert!(self.active_methods > 0);
                        let victim = self.num_blocks - self.active_methods;
                        self.active_blocks -= self.entries[victim].num_blocks;
                        self.active_methods -= 1;
                    }

                    self.active_methods += 1;
                    self.active_blocks += self.transfer_blocks;
                    self.stats.blocks_transferred += self.transfer_blocks as u64;
                    self.stats.max_blocks_transferred = self
                        .stats
                        .max_blocks_transferred
                        .max(self.transfer_blocks as u64);
                    self.stats.bytes_transferred += self.transfer_bytes as u64;
                    self.stats.max_bytes_transferred =
                        self.stats.max_bytes_transferred.max(self.transfer_bytes as u64);

                    // reuse the evicted slot's buffer for the new method
                    let slot = self.num_blocks - self.active_methods;
                    let mut entry = self.entries.remove(slot);
                    entry.update(address, self.transfer_blocks, self.transfer_bytes);
                    self.entries.push(entry);
                    self.active_idx = self.num_blocks - 1;

                    self.phase = Phase::Transfer;
                }
                Phase::Transfer => {
                    debug_assert!(self.transfer_blocks != 0 && self.transfer_bytes != 0);
                    let bytes = self.transfer_blocks * self.block_bytes;
                    let entry = self.entries.last_mut().expect("method cache has entries");
                    if !mem.read(address, &mut entry.buf[..bytes], true)? {
                        return Ok(false);
                    }
                    self.transfer_blocks = 0;
                    self.transfer_bytes = 0;
                    self.phase = Phase::Idle;
                    return Ok(true);
                }
            }
        }
    }

    /// Pure residency check; never starts a load.
    pub fn assert_availability(&self, address: Uword) -> bool {
        self.entries[self.active_window()]
            .iter()
            .any(|e| e.address == address)
    }

    /// Fetches two instruction words from the currently active method.
    ///
    /// Fails with `ILLEGAL_PC` when `address` lies outside the method.
    pub fn fetch(&self, address: Uword, iw: &mut [Uword; NUM_SLOTS]) -> SimResult<bool> {
        let entry = match self.policy {
            MethodCachePolicy::Lru => self.entries.last().expect("method cache has entries"),
            _ => &self.entries[self.active_idx],
        };
        if address < entry.address || entry.address + entry.num_bytes <= address {
            return Err(SimException::illegal_pc(entry.address));
        }
        let base = (address - entry.address) as usize;
        for (slot, word) in iw.iter_mut().enumerate() {
            let mut bytes = [0u8; 4];
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = entry.buf.get(base + slot * 4 + i).copied().unwrap_or(0);
            }
            *word = uword_from_be(&bytes);
        }
        Ok(true)
    }

    /// The active method's base address.
    pub fn active_base(&self) -> Uword {
        match self.policy {
            MethodCachePolicy::Lru => self.entries.last().map(|e| e.address).unwrap_or(0),
            _ => self.entries[self.active_idx].address,
        }
    }

    /// The active method's size in bytes.
    pub fn active_bytes(&self) -> Uword {
        match self.policy {
            MethodCachePolicy::Lru => self.entries.last().map(|e| e.num_bytes).unwrap_or(0),
            _ => self.entries[self.active_idx].num_bytes,
        }
    }

    /// Advances the cache by one cycle.
    pub fn tick(&mut self) {
        if self.phase != Phase::Idle {
            self.stats.stall_cycles += 1;
        }
    }

    /// Dumps the active entries for the `all` debug format.
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(out, " #M: {:02} #B: {:02}", self.active_methods, self.active_blocks)?;
        for (n, i) in self.active_window().rev().enumerate() {
            let e = &self.entries[i];
            writeln!(
                out,
                "   M{:02}: 0x{:08x} ({:8} Blk {:8} b)",
                n + 1,
                e.address,
                e.num_blocks,
                e.num_bytes
            )?;
        }
        Ok(())
    }
}
