//! Data cache models.
//!
//! Three organizations over the main memory: a perfect cache (every access
//! hits, no timing), a non-caching pass-through (every access pays full
//! memory timing), and set-associative caches with per-set LRU replacement.
//! The set-associative variant keeps tags only; data always lives in the
//! backing memory, so a hit is an untimed peek and a miss synthesizes the
//! line-sized memory request and reports not-ready until it completes.

use crate::common::data::Uword;
use crate::common::error::SimResult;
use crate::config::{DataCacheConfig, DataCacheKind};
use crate::soc::MainMemory;

/// Access counters of a data cache.
#[derive(Debug, Default, Clone)]
pub struct DataCacheStats {
    /// Read accesses served from the cache.
    pub read_hits: u64,
    /// Read accesses that went to memory.
    pub read_misses: u64,
    /// Write accesses that hit a cached line.
    pub write_hits: u64,
    /// Write accesses to uncached lines.
    pub write_misses: u64,
    /// Bytes read through the cache.
    pub bytes_read: u64,
    /// Bytes written through the cache.
    pub bytes_written: u64,
}

/// A set-associative, tags-only cache with LRU replacement.
///
/// Write-through, no write-allocate: stores always go to memory and update
/// recency only on a hit.
pub struct SetAssocCache {
    line_bytes: Uword,
    num_sets: usize,
    ways: usize,
    /// Per-set tag lists, most recently used first.
    sets: Vec<Vec<Uword>>,
    /// Scratch buffer for line fills; reused, never reallocated.
    line_buf: Vec<u8>,
    /// Line fill in progress, to count each miss once across retries.
    pending_fill: Option<Uword>,
    /// Access counters.
    pub stats: DataCacheStats,
}

impl SetAssocCache {
    fn new(config: &DataCacheConfig, ways: usize) -> Self {
        let line_bytes = config.line_bytes.max(4);
        let num_lines = (config.size_bytes / line_bytes).max(ways);
        let num_sets = num_lines / ways;
        Self {
            line_bytes: line_bytes as Uword,
            num_sets,
            ways,
            sets: vec![Vec::with_capacity(ways); num_sets],
            line_buf: vec![0; line_bytes],
            pending_fill: None,
            stats: DataCacheStats::default(),
        }
    }

    #[inline]
    fn set_index(&self, address: Uword) -> usize {
        (address / self.line_bytes) as usize % self.num_sets
    }

    #[inline]
    fn tag(&self, address: Uword) -> Uword {
        address / (self.line_bytes * self.num_sets as Uword)
    }

    fn lookup(&self, address: Uword) -> bool {
        let tag = self.tag(address);
        self.sets[self.set_index(address)].contains(&tag)
    }

    /// Moves the line holding `address` to the MRU position.
    fn promote(&mut self, address: Uword) {
        let tag = self.tag(address);
        let set = self.set_index(address);
        let list = &mut self.sets[set];
        if let Some(pos) = list.iter().position(|&t| t == tag) {
            list.remove(pos);
        }
        list.insert(0, tag);
    }

    /// Installs the line holding `address`, evicting the LRU line if full.
    fn install(&mut self, address: Uword) {
        let tag = self.tag(address);
        let set = self.set_index(address);
        let list = &mut self.sets[set];
        if list.len() == self.ways {
            list.pop();
        }
        list.insert(0, tag);
    }

    fn read(&mut self, mem: &mut MainMemory, address: Uword, buf: &mut [u8]) -> SimResult<bool> {
        if self.lookup(address) {
            self.promote(address);
            mem.read_peek(address, buf)?;
            self.stats.read_hits += 1;
            self.stats.bytes_read += buf.len() as u64;
            return Ok(true);
        }

        let line_address = address - address % self.line_bytes;
        if self.pending_fill != Some(line_address) {
            self.stats.read_misses += 1;
            self.pending_fill = Some(line_address);
        }
        if mem.read(line_address, &mut self.line_buf, false)? {
            self.install(address);
            self.pending_fill = None;
            mem.read_peek(address, buf)?;
            self.stats.bytes_read += buf.len() as u64;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn write(&mut self, mem: &mut MainMemory, address: Uword, buf: &[u8]) -> SimResult<bool> {
        let hit = self.lookup(address);
        if mem.write(address, buf)? {
            if hit {
                self.promote(address);
                self.stats.write_hits += 1;
            } else {
                self.stats.write_misses += 1;
            }
            self.stats.bytes_written += buf.len() as u64;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// The data cache; the concrete organization is fixed at construction.
pub enum DataCache {
    /// Perfect cache: untimed access, everything counts as a hit.
    Ideal(DataCacheStats),
    /// No cache: every access pays full memory timing.
    Bypass(DataCacheStats),
    /// Set-associative LRU cache.
    SetAssoc(SetAssocCache),
}

impl DataCache {
    /// Builds a data cache from its configuration.
    pub fn new(config: &DataCacheConfig) -> Self {
        match config.kind {
            DataCacheKind::Ideal => DataCache::Ideal(DataCacheStats::default()),
            DataCacheKind::No => DataCache::Bypass(DataCacheStats::default()),
            kind => DataCache::SetAssoc(SetAssocCache::new(config, kind.ways())),
        }
    }

    /// A simulated read through the cache; `true` means `buf` is valid.
    pub fn read(&mut self, mem: &mut MainMemory, address: Uword, buf: &mut [u8]) -> SimResult<bool> {
        match self {
            DataCache::Ideal(stats) => {
                mem.read_peek(address, buf)?;
                stats.read_hits += 1;
                stats.bytes_read += buf.len() as u64;
                Ok(true)
            }
            DataCache::Bypass(stats) => {
                let done = mem.read(address, buf, false)?;
                if done {
                    stats.read_misses += 1;
                    stats.bytes_read += buf.len() as u64;
                }
                Ok(done)
            }
            DataCache::SetAssoc(cache) => cache.read(mem, address, buf),
        }
    }

    /// A simulated write through the cache; `true` means the data is accepted.
    pub fn write(&mut self, mem: &mut MainMemory, address: Uword, buf: &[u8]) -> SimResult<bool> {
        match self {
            DataCache::Ideal(stats) => {
                mem.write_peek(address, buf)?;
                stats.write_hits += 1;
                stats.bytes_written += buf.len() as u64;
                Ok(true)
            }
            DataCache::Bypass(stats) => {
                let done = mem.write(address, buf)?;
                if done {
                    stats.write_misses += 1;
                    stats.bytes_written += buf.len() as u64;
                }
                Ok(done)
            }
            DataCache::SetAssoc(cache) => cache.write(mem, address, buf),
        }
    }

    /// True when the line holding `address` is cached.
    pub fn contains(&self, address: Uword) -> bool {
        match self {
            DataCache::Ideal(_) => true,
            DataCache::Bypass(_) => false,
            DataCache::SetAssoc(cache) => cache.lookup(address),
        }
    }

    /// Access counters.
    pub fn stats(&self) -> &DataCacheStats {
        match self {
            DataCache::Ideal(stats) | DataCache::Bypass(stats) => stats,
            DataCache::SetAssoc(cache) => &cache.stats,
        }
    }

    /// Dumps the tag state for the `all` debug format.
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        match self {
            DataCache::Ideal(_) => writeln!(out, " ideal"),
            DataCache::Bypass(_) => writeln!(out, " bypass"),
            DataCache::SetAssoc(cache) => {
                for (i, set) in cache.sets.iter().enumerate() {
                    if set.is_empty() {
                        continue;
                    }
                    write!(out, " S{:03}:", i)?;
                    for tag in set {
                        write!(out, " {:08x}", tag)?;
                    }
                    writeln!(out)?;
                }
                Ok(())
            }
        }
    }
}
