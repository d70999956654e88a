//! Stack cache.
//!
//! A block-organized scratchpad for stack data, backed by main memory.
//! `reserve`, `free`, and `ensure` operate in blocks (ceiling-divided from
//! the requested byte size). Reserving beyond the on-cache capacity spills
//! the oldest resident blocks to memory; ensuring more than is resident
//! fills them back. The stack-top register tracks the lowest address of the
//! spilled region: a spill of `n` bytes writes `[top - n, top)` and lowers
//! the top, a fill of `n` bytes reads `[top, top + n)` and raises it.
//!
//! Plain reads and writes address the resident slice relative to the top of
//! the stack and never report busy while no transfer is in progress;
//! transfers serialize all operations.

use crate::common::data::Uword;
use crate::common::error::{SimException, SimResult};
use crate::config::{StackCacheConfig, StackCacheKind};
use crate::soc::MainMemory;

/// Occupancy and transfer counters of the stack cache.
#[derive(Debug, Default, Clone)]
pub struct StackCacheStats {
    /// Blocks reserved over the whole run.
    pub blocks_reserved_total: u64,
    /// Largest total allocation (resident plus spilled) in blocks.
    pub max_blocks_allocated: u64,
    /// Largest single reservation in blocks.
    pub max_blocks_reserved: u64,
    /// Blocks spilled to memory.
    pub blocks_spilled: u64,
    /// Largest single spill in blocks.
    pub max_blocks_spilled: u64,
    /// Blocks filled from memory.
    pub blocks_filled: u64,
    /// Largest single fill in blocks.
    pub max_blocks_filled: u64,
    /// Frees that left the cache entirely empty.
    pub free_empty: u64,
    /// Read accesses.
    pub read_accesses: u64,
    /// Bytes read.
    pub bytes_read: u64,
    /// Write accesses.
    pub write_accesses: u64,
    /// Bytes written.
    pub bytes_written: u64,
}

/// Transfers to or from the stack cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TransferPhase {
    /// No transfer ongoing.
    Idle,
    /// Data moves from the stack cache to memory.
    Spill,
    /// Data moves from memory back to the stack cache.
    Fill,
}

impl std::fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransferPhase::Idle => "idle",
            TransferPhase::Spill => "spill",
            TransferPhase::Fill => "fill",
        })
    }
}

/// A stack cache with unbounded space; reserve and ensure never block.
pub struct IdealStackCache {
    content: Vec<u8>,
}

impl IdealStackCache {
    fn new() -> Self {
        Self { content: Vec::new() }
    }

    fn reserve(&mut self, size: Uword) {
        self.content.resize(self.content.len() + size as usize, 0);
    }

    fn free(&mut self, size: Uword) -> SimResult<()> {
        if self.content.len() < size as usize {
            return Err(SimException::stack_exceeded("free exceeds stack size"));
        }
        self.content.truncate(self.content.len() - size as usize);
        Ok(())
    }

    fn read(&self, offset: Uword, buf: &mut [u8]) -> SimResult<()> {
        let end = offset as usize + buf.len();
        if self.content.len() < end {
            return Err(SimException::stack_exceeded("read beyond stack size"));
        }
        let start = self.content.len() - end;
        buf.copy_from_slice(&self.content[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: Uword, buf: &[u8]) -> SimResult<()> {
        let end = offset as usize + buf.len();
        if self.content.len() < end {
            return Err(SimException::stack_exceeded("write beyond stack size"));
        }
        let start = self.content.len() - end;
        self.content[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// A block-organized stack cache with automatic spill and fill.
pub struct BlockStackCache {
    /// All allocated stack bytes, resident suffix last.
    content: Vec<u8>,
    num_blocks: usize,
    block_bytes: usize,
    total_blocks: usize,
    phase: TransferPhase,
    /// Staging buffer for spill transfers; reused, never reallocated.
    buffer: Vec<u8>,
    transfer_blocks: usize,
    reserved_blocks: usize,
    spilled_blocks: usize,
    /// Occupancy and transfer counters.
    pub stats: StackCacheStats,
}

impl BlockStackCache {
    fn new(config: &StackCacheConfig) -> Self {
        let num_blocks = config.num_blocks.max(1);
        let block_bytes = config.block_bytes.max(4);
        let total_blocks = config.total_blocks.max(num_blocks);
        Self {
            content: Vec::new(),
            num_blocks,
            block_bytes,
            total_blocks,
            phase: TransferPhase::Idle,
            // a single reservation may spill everything beyond the resident
            // capacity in one transfer
            buffer: vec![0; total_blocks * block_bytes],
            transfer_blocks: 0,
            reserved_blocks: 0,
            spilled_blocks: 0,
            stats: StackCacheStats::default(),
        }
    }

    fn blocks(&self, size: Uword) -> usize {
        (size as usize).div_ceil(self.block_bytes)
    }

    fn reserve(&mut self, mem: &mut MainMemory, size: Uword, stack_top: &mut Uword) -> SimResult<bool> {
        loop {
            match self.phase {
                TransferPhase::Idle => {
                    debug_assert_eq!(self.transfer_blocks, 0);
                    let size_blocks = self.blocks(size);

                    self.reserved_blocks += size_blocks;
                    let grow = size_blocks * self.block_bytes;
                    self.content.resize(self.content.len() + grow, 0);

                    self.stats.blocks_reserved_total += size_blocks as u64;
                    self.stats.max_blocks_reserved =
                        self.stats.max_blocks_reserved.max(size_blocks as u64);
                    self.stats.max_blocks_allocated = self
                        .stats
                        .max_blocks_allocated
                        .max((self.content.len() / self.block_bytes) as u64);

                    if self.reserved_blocks <= self.num_blocks {
                        return Ok(true);
                    }

                    // overflow: spill the oldest resident blocks; once the
                    // spill completes exactly num_blocks stay resident
                    self.transfer_blocks = self.reserved_blocks - self.num_blocks;
                    if self.num_blocks + self.transfer_blocks + self.spilled_blocks
                        > self.total_blocks
                    {
                        return Err(SimException::stack_exceeded("total stack size exceeded"));
                    }
                    let n = self.transfer_blocks * self.block_bytes;
                    let idx = self.content.len() - self.reserved_blocks * self.block_bytes;
                    self.buffer[..n].copy_from_slice(&self.content[idx..idx + n]);
                    self.phase = TransferPhase::Spill;
                }
                TransferPhase::Spill => {
                    debug_assert_ne!(self.transfer_blocks, 0);
                    let n = self.transfer_blocks * self.block_bytes;
                    let address = stack_top.wrapping_sub(n as Uword);
                    if !mem.write(address, &self.buffer[..n])? {
                        return Ok(false);
                    }
                    self.reserved_blocks -= self.transfer_blocks;
                    self.spilled_blocks += self.transfer_blocks;
                    self.stats.blocks_spilled += self.transfer_blocks as u64;
                    self.stats.max_blocks_spilled =
                        self.stats.max_blocks_spilled.max(self.transfer_blocks as u64);
                    *stack_top = address;
                    self.transfer_blocks = 0;
                    self.phase = TransferPhase::Idle;
                    return Ok(true);
                }
                TransferPhase::Fill => unreachable!("reserve during fill"),
            }
        }
    }

    fn free(&mut self, size: Uword, stack_top: &mut Uword) -> SimResult<bool> {
        debug_assert!(self.phase == TransferPhase::Idle && self.transfer_blocks == 0);

        let size_blocks = self.blocks(size);
        if size_blocks > self.spilled_blocks + self.reserved_blocks {
            return Err(SimException::stack_exceeded("free exceeds allocated stack"));
        }

        self.content.truncate(self.content.len() - size_blocks * self.block_bytes);

        if size_blocks <= self.reserved_blocks {
            self.reserved_blocks -= size_blocks;
        } else {
            // also drop spilled blocks without any memory traffic
            let freed_spilled = size_blocks - self.reserved_blocks;
            self.spilled_blocks -= freed_spilled;
            self.reserved_blocks = 0;
            *stack_top = stack_top.wrapping_add((freed_spilled * self.block_bytes) as Uword);
            self.stats.free_empty += 1;
        }
        Ok(true)
    }

    fn ensure(&mut self, mem: &mut MainMemory, size: Uword, stack_top: &mut Uword) -> SimResult<bool> {
        loop {
            match self.phase {
                TransferPhase::Idle => {
                    debug_assert_eq!(self.transfer_blocks, 0);
                    let size_blocks = self.blocks(size);
                    if size_blocks > self.num_blocks {
                        return Err(SimException::stack_exceeded("ensure exceeds stack cache size"));
                    }
                    if size_blocks > self.reserved_blocks + self.spilled_blocks {
                        return Err(SimException::stack_exceeded("ensure exceeds allocated stack"));
                    }
                    if self.reserved_blocks >= size_blocks {
                        return Ok(true);
                    }
                    self.transfer_blocks = size_blocks - self.reserved_blocks;
                    debug_assert!(self.transfer_blocks <= self.spilled_blocks);
                    self.phase = TransferPhase::Fill;
                }
                TransferPhase::Fill => {
                    debug_assert_ne!(self.transfer_blocks, 0);
                    let n = self.transfer_blocks * self.block_bytes;
                    // the cache content was never erased during the spill, so
                    // the read only models the transfer timing
                    if !mem.read(*stack_top, &mut self.buffer[..n], false)? {
                        return Ok(false);
                    }
                    self.spilled_blocks -= self.transfer_blocks;
                    self.reserved_blocks += self.transfer_blocks;
                    self.stats.blocks_filled += self.transfer_blocks as u64;
                    self.stats.max_blocks_filled =
                        self.stats.max_blocks_filled.max(self.transfer_blocks as u64);
                    *stack_top = stack_top.wrapping_add(n as Uword);
                    self.transfer_blocks = 0;
                    self.phase = TransferPhase::Idle;
                    return Ok(true);
                }
                TransferPhase::Spill => unreachable!("ensure during spill"),
            }
        }
    }

    fn read(&mut self, offset: Uword, buf: &mut [u8]) -> SimResult<()> {
        let end = offset as usize + buf.len();
        if end > self.reserved_blocks * self.block_bytes {
            return Err(SimException::stack_exceeded("read beyond resident stack"));
        }
        let start = self.content.len() - end;
        buf.copy_from_slice(&self.content[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: Uword, buf: &[u8]) -> SimResult<()> {
        let end = offset as usize + buf.len();
        if end > self.reserved_blocks * self.block_bytes {
            return Err(SimException::stack_exceeded("write beyond resident stack"));
        }
        let start = self.content.len() - end;
        self.content[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// The stack cache; the concrete organization is fixed at construction.
pub enum StackCache {
    /// Unbounded cache without spill or fill.
    Ideal(IdealStackCache),
    /// Block-organized cache with automatic spill and fill.
    Block(BlockStackCache),
}

impl StackCache {
    /// Builds a stack cache from its configuration.
    pub fn new(config: &StackCacheConfig) -> Self {
        match config.kind {
            StackCacheKind::Ideal => StackCache::Ideal(IdealStackCache::new()),
            StackCacheKind::Block => StackCache::Block(BlockStackCache::new(config)),
        }
    }

    /// Reserves `size` bytes, spilling to memory when the cache overflows.
    ///
    /// `true` when the space is reserved; `false` while a spill is ongoing.
    pub fn reserve(
        &mut self,
        mem: &mut MainMemory,
        size: Uword,
        stack_top: &mut Uword,
    ) -> SimResult<bool> {
        match self {
            StackCache::Ideal(sc) => {
                sc.reserve(size);
                Ok(true)
            }
            StackCache::Block(sc) => sc.reserve(mem, size, stack_top),
        }
    }

    /// Frees `size` bytes; spilled blocks beyond the resident portion are
    /// dropped without memory traffic.
    pub fn free(&mut self, size: Uword, stack_top: &mut Uword) -> SimResult<bool> {
        match self {
            StackCache::Ideal(sc) => {
                sc.free(size)?;
                Ok(true)
            }
            StackCache::Block(sc) => sc.free(size, stack_top),
        }
    }

    /// Ensures at least `size` bytes are resident, filling from memory.
    ///
    /// `true` when the data is resident; `false` while a fill is ongoing.
    pub fn ensure(
        &mut self,
        mem: &mut MainMemory,
        size: Uword,
        stack_top: &mut Uword,
    ) -> SimResult<bool> {
        match self {
            StackCache::Ideal(_) => Ok(true),
            StackCache::Block(sc) => sc.ensure(mem, size, stack_top),
        }
    }

    /// Reads from the resident slice, `offset` relative to the stack top.
    pub fn read(&mut self, offset: Uword, buf: &mut [u8]) -> SimResult<bool> {
        match self {
            StackCache::Ideal(sc) => sc.read(offset, buf)?,
            StackCache::Block(sc) => {
                sc.read(offset, buf)?;
                sc.stats.read_accesses += 1;
                sc.stats.bytes_read += buf.len() as u64;
            }
        }
        Ok(true)
    }

    /// Writes to the resident slice, `offset` relative to the stack top.
    pub fn write(&mut self, offset: Uword, buf: &[u8]) -> SimResult<bool> {
        match self {
            StackCache::Ideal(sc) => sc.write(offset, buf)?,
            StackCache::Block(sc) => {
                sc.write(offset, buf)?;
                sc.stats.write_accesses += 1;
                sc.stats.bytes_written += buf.len() as u64;
            }
        }
        Ok(true)
    }

    /// Currently resident blocks.
    pub fn reserved_blocks(&self) -> usize {
        match self {
            StackCache::Ideal(_) => 0,
            StackCache::Block(sc) => sc.reserved_blocks,
        }
    }

    /// Blocks currently spilled to memory.
    pub fn spilled_blocks(&self) -> usize {
        match self {
            StackCache::Ideal(_) => 0,
            StackCache::Block(sc) => sc.spilled_blocks,
        }
    }

    /// Current size of the stack in bytes, including spilled data.
    pub fn size(&self) -> Uword {
        match self {
            StackCache::Ideal(sc) => sc.content.len() as Uword,
            StackCache::Block(sc) => {
                ((sc.reserved_blocks + sc.spilled_blocks) * sc.block_bytes) as Uword
            }
        }
    }

    /// Occupancy and transfer counters, when tracked.
    pub fn stats(&self) -> Option<&StackCacheStats> {
        match self {
            StackCache::Ideal(_) => None,
            StackCache::Block(sc) => Some(&sc.stats),
        }
    }

    /// Advances the cache by one cycle.
    pub fn tick(&mut self) {}

    /// Dumps the occupancy for the `all` debug format.
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        match self {
            StackCache::Ideal(sc) => writeln!(out, " ideal: {} bytes", sc.content.len()),
            StackCache::Block(sc) => writeln!(
                out,
                " {:>5}: Reserved: {:4} ({}) Spilled: {:4} ({})",
                sc.phase, sc.reserved_blocks, sc.num_blocks, sc.spilled_blocks, sc.total_blocks
            ),
        }
    }
}
