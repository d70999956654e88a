//! Main memory models with burst-level timing.
//!
//! This module implements the backing store of the simulated core. It provides:
//! 1. **IdealMemory:** a lazily initialized byte store that is ready every
//!    cycle, with a configurable uninitialized-read policy.
//! 2. **DelayedMemory:** a request queue in front of the ideal store that
//!    models fixed-delay bursts, variable (per-page) bursts, or TDM
//!    arbitration, with posted writes up to a configurable depth.
//!
//! A `true` result from `read`/`write` means the caller may use the buffer
//! this cycle; `false` is the signal to stall and retry next cycle.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use crate::common::data::Uword;
use crate::common::error::{SimException, SimResult};
use crate::config::{MemCheck, MemoryConfig, MemoryKind};

/// A word-free view of all counters kept by the delayed memory models.
#[derive(Debug, Default, Clone)]
pub struct MemoryStats {
    /// Largest request queue length observed.
    pub max_queue_size: usize,
    /// Requests directly following the previous request's address range.
    pub consecutive_requests: u64,
    /// Sum of all request latencies, in cycles.
    pub busy_cycles: u64,
    /// Cycles in which the queue held only posted writes (hidden, not stalling).
    pub posted_write_cycles: u64,
    /// Number of load requests.
    pub reads: u64,
    /// Number of store requests.
    pub writes: u64,
    /// Bytes requested by loads.
    pub bytes_read: u64,
    /// Bytes requested by stores.
    pub bytes_written: u64,
    /// Bytes moved for loads after burst alignment.
    pub bytes_read_transferred: u64,
    /// Bytes moved for stores after burst alignment.
    pub bytes_write_transferred: u64,
    /// Histogram of request sizes, bucketed to words.
    pub requests_per_size: BTreeMap<Uword, u64>,
}

/// A lazily initialized big-endian byte store, ready in the same cycle.
///
/// Pages are initialized on first touch, either to zero or to pseudo-random
/// bytes, to help catch reads of memory that was never written. The
/// uninitialized-read policy decides whether such reads warn or fail.
pub struct IdealMemory {
    content: Vec<u8>,
    init_watermark: usize,
    init_vector: Option<Vec<bool>>,
    randomize: bool,
    rng: u64,
    check: MemCheck,
}

impl IdealMemory {
    /// Creates a memory of `size` bytes with the given checking policy.
    pub fn new(size: usize, check: MemCheck, randomize: bool) -> Self {
        let init_vector = match check {
            MemCheck::None => None,
            _ => Some(vec![false; size]),
        };
        Self {
            content: vec![0; size],
            init_watermark: 0,
            init_vector,
            randomize,
            rng: 0x2545_F491_4F6C_DD1D,
            check,
        }
    }

    /// Size of the memory in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    fn next_random_byte(&mut self) -> u8 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x as u8
    }

    /// Validates the access range and lazily initializes memory content.
    ///
    /// For reads, applies the uninitialized-read policy unless `ignore_errors`
    /// is set; for writes, marks the touched bytes as initialized.
    fn check_initialize(
        &mut self,
        address: Uword,
        size: Uword,
        is_read: bool,
        ignore_errors: bool,
    ) -> SimResult<()> {
        let len = self.content.len();
        let address = address as usize;
        let size = size as usize;
        if address > len || size > len - address {
            return Err(SimException::unmapped(address as Uword));
        }

        // lazily initialize content up to a little beyond the access
        let init_size = len.min(address + size.max(1024));
        if self.randomize {
            for i in self.init_watermark..init_size {
                self.content[i] = self.next_random_byte();
            }
        }
        self.init_watermark = self.init_watermark.max(init_size);

        let Some(init_vector) = self.init_vector.as_mut() else {
            return Ok(());
        };

        if is_read {
            if ignore_errors {
                return Ok(());
            }
            let count = init_vector[address..address + size]
                .iter()
                .filter(|&&initialized| !initialized)
                .count();
            let address_only = self.check.address_only();
            if (address_only && count == size) || (!address_only && count > 0) {
                let msg = format!(
                    "Read of address 0x{:x} of size {} reads {} uninitialized bytes",
                    address, size, count
                );
                if self.check.warns() {
                    log::warn!("{}", msg);
                } else {
                    return Err(SimException::illegal_access(msg));
                }
            }
        } else {
            for initialized in &mut init_vector[address..address + size] {
                *initialized = true;
            }
        }
        Ok(())
    }

    /// A simulated access to the read port; always ready.
    pub fn read(&mut self, address: Uword, buf: &mut [u8]) -> SimResult<bool> {
        self.check_initialize(address, buf.len() as Uword, true, false)?;
        let a = address as usize;
        buf.copy_from_slice(&self.content[a..a + buf.len()]);
        Ok(true)
    }

    /// A simulated access to the write port; always ready.
    pub fn write(&mut self, address: Uword, buf: &[u8]) -> SimResult<bool> {
        self.check_initialize(address, buf.len() as Uword, false, false)?;
        let a = address as usize;
        self.content[a..a + buf.len()].copy_from_slice(buf);
        Ok(true)
    }

    /// Reads without simulating timing and without failing the init check.
    pub fn read_peek(&mut self, address: Uword, buf: &mut [u8]) -> SimResult<()> {
        self.check_initialize(address, buf.len() as Uword, true, true)?;
        let a = address as usize;
        buf.copy_from_slice(&self.content[a..a + buf.len()]);
        Ok(())
    }

    /// Writes without simulating timing.
    pub fn write_peek(&mut self, address: Uword, buf: &[u8]) -> SimResult<()> {
        self.check_initialize(address, buf.len() as Uword, false, true)?;
        let a = address as usize;
        self.content[a..a + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// Timing model of a delayed memory.
enum TimingModel {
    /// Latency is `bursts * burst_ticks` plus the read delay.
    Fixed,
    /// Latency pays one burst per crossed page plus one cycle per word.
    VariableBurst { page_bytes: u32 },
    /// The queue head only advances inside this core's slot of a globally
    /// periodic round of `num_cores * burst_ticks + refresh_ticks` cycles.
    Tdm {
        round_length: u32,
        round_start: u32,
        round_counter: u32,
        transferring: bool,
    },
}

/// One outstanding memory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Request {
    address: Uword,
    size: Uword,
    is_load: bool,
    is_posted: bool,
    ticks_remaining: u32,
}

/// A memory with a request FIFO modeling burst transfer latency.
///
/// Requests are retired strictly in order; only the queue head counts down.
/// Posted writes return ready immediately while the queue is shallower than
/// the configured depth, and cycles in which the queue holds only posted
/// writes are counted as hidden rather than stalling.
pub struct DelayedMemory {
    store: IdealMemory,
    timing: TimingModel,
    burst_bytes: u32,
    burst_ticks: u32,
    read_delay_ticks: u32,
    posted_writes: usize,
    requests: VecDeque<Request>,
    /// Transfer statistics.
    pub stats: MemoryStats,
    last_address: Uword,
    last_is_load: bool,
}

impl DelayedMemory {
    fn new(store: IdealMemory, timing: TimingModel, config: &MemoryConfig) -> Self {
        Self {
            store,
            timing,
            burst_bytes: config.burst_bytes.max(4),
            burst_ticks: config.burst_ticks,
            read_delay_ticks: config.read_delay_ticks,
            posted_writes: config.posted_writes,
            requests: VecDeque::new(),
            stats: MemoryStats::default(),
            last_address: Uword::MAX,
            last_is_load: false,
        }
    }

    /// Expands `[address, address + size)` to burst alignment.
    fn aligned(&self, address: Uword, size: Uword) -> (Uword, Uword) {
        let start = (address / self.burst_bytes) * self.burst_bytes;
        let end = ((address + size - 1) / self.burst_bytes + 1) * self.burst_bytes;
        (start, end - start)
    }

    fn transfer_ticks(
        &self,
        aligned_address: Uword,
        aligned_size: Uword,
        is_load: bool,
        is_posted: bool,
    ) -> u32 {
        let mut ticks = match self.timing {
            TimingModel::Fixed => {
                let bursts = (aligned_size - 1) / self.burst_bytes + 1;
                bursts * self.burst_ticks
            }
            TimingModel::VariableBurst { page_bytes } => {
                let start_page = aligned_address / page_bytes;
                let end_page = (aligned_address + aligned_size - 1) / page_bytes;
                let num_pages = end_page - start_page + 1;
                // one full burst cost per page, the rest at one cycle per word
                let remainder = aligned_size.saturating_sub(num_pages * self.burst_bytes);
                num_pages * self.burst_ticks + remainder / 4
            }
            // TDM counts down whole slots at round boundaries instead of ticks.
            TimingModel::Tdm { .. } => return (aligned_size - 1) / self.burst_bytes + 1,
        };
        if is_load || !is_posted {
            ticks += self.read_delay_ticks;
        }
        ticks
    }

    fn tick_request(&mut self) {
        let Some(req) = self.requests.front_mut() else {
            return;
        };
        if req.ticks_remaining == 0 {
            return;
        }
        match &mut self.timing {
            TimingModel::Fixed | TimingModel::VariableBurst { .. } => {
                req.ticks_remaining -= 1;
            }
            TimingModel::Tdm {
                round_length,
                round_start,
                round_counter,
                transferring,
            } => {
                let mut round_end = *round_start + self.burst_ticks;
                if !req.is_posted {
                    round_end += self.read_delay_ticks;
                }
                if round_end >= *round_length {
                    round_end -= *round_length;
                }
                if round_end == *round_counter {
                    req.ticks_remaining -= 1;
                    *transferring = false;
                }
            }
        }
        if let Some(req) = self.requests.front() {
            if req.ticks_remaining == 0 && req.is_posted {
                self.requests.pop_front();
            }
        }
    }

    fn find(&self, address: Uword, size: Uword, is_load: bool) -> Option<usize> {
        self.requests
            .iter()
            .position(|r| r.address == address && r.size == size && r.is_load == is_load)
    }

    /// Pushes a new request and records its statistics.
    fn create(
        &mut self,
        address: Uword,
        size: Uword,
        is_load: bool,
        is_posted: bool,
    ) -> SimResult<()> {
        self.store.check_initialize(address, size, is_load, false)?;

        let (aligned_address, aligned_size) = self.aligned(address, size);
        let ticks = self.transfer_ticks(aligned_address, aligned_size, is_load, is_posted);
        self.requests.push_back(Request {
            address,
            size,
            is_load,
            is_posted,
            ticks_remaining: ticks,
        });

        self.stats.max_queue_size = self.stats.max_queue_size.max(self.requests.len());
        self.stats.busy_cycles += ticks as u64;
        if is_load == self.last_is_load && address == self.last_address {
            self.stats.consecutive_requests += 1;
        }
        if is_load {
            self.stats.reads += 1;
            self.stats.bytes_read += size as u64;
            self.stats.bytes_read_transferred += aligned_size as u64;
        } else {
            self.stats.writes += 1;
            self.stats.bytes_written += size as u64;
            self.stats.bytes_write_transferred += aligned_size as u64;
        }
        self.last_address = address + size;
        self.last_is_load = is_load;

        let bucket = ((size - 1) / 4 + 1) * 4;
        *self.stats.requests_per_size.entry(bucket).or_insert(0) += 1;
        Ok(())
    }

    /// A simulated access to the read port.
    pub fn read(&mut self, address: Uword, buf: &mut [u8], _is_fetch: bool) -> SimResult<bool> {
        let size = buf.len() as Uword;
        if self.find(address, size, true).is_none() {
            self.create(address, size, true, false)?;
        }
        let idx = self.find(address, size, true).unwrap();
        if self.requests[idx].ticks_remaining == 0 {
            // only the queue head ever reaches zero ticks
            debug_assert_eq!(idx, 0);
            self.requests.pop_front();
            self.store.read_peek(address, buf)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// A simulated access to the write port.
    ///
    /// Posted writes commit their data as soon as the queue accepts them and
    /// retire from the queue asynchronously in `tick`.
    pub fn write(&mut self, address: Uword, buf: &[u8]) -> SimResult<bool> {
        let size = buf.len() as Uword;
        let posted = self.posted_writes > 0;

        if let Some(idx) = self.find(address, size, false) {
            if self.requests[idx].ticks_remaining == 0 {
                debug_assert_eq!(idx, 0);
                self.requests.pop_front();
                self.store.write(address, buf)?;
                return Ok(true);
            }
        } else {
            self.create(address, size, false, posted)?;
        }

        if posted {
            let accepted = self.requests.len() <= self.posted_writes;
            if accepted {
                self.store.write(address, buf)?;
            }
            Ok(accepted)
        } else {
            Ok(false)
        }
    }

    /// Reads without simulating timing.
    pub fn read_peek(&mut self, address: Uword, buf: &mut [u8]) -> SimResult<()> {
        self.store.read_peek(address, buf)
    }

    /// Writes without simulating timing.
    pub fn write_peek(&mut self, address: Uword, buf: &[u8]) -> SimResult<()> {
        self.store.write_peek(address, buf)
    }

    /// True when no request is outstanding.
    pub fn is_ready(&self) -> bool {
        self.requests.is_empty()
    }

    /// Advances the request queue by one cycle.
    pub fn tick(&mut self) {
        // a queue holding only posted writes hides the latency from the core
        if !self.requests.is_empty()
            && self.requests.len() <= self.posted_writes
            && self.requests.iter().all(|r| r.is_posted)
        {
            self.stats.posted_write_cycles += 1;
        }

        if let TimingModel::Tdm {
            round_length,
            round_start,
            round_counter,
            transferring,
        } = &mut self.timing
        {
            *round_counter = (*round_counter + 1) % *round_length;
            if *round_counter == *round_start {
                *transferring = !self.requests.is_empty();
            }
        }

        self.tick_request();
    }

    /// Dumps the request queue for the `all` debug format.
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        if self.requests.is_empty() {
            return writeln!(out, " IDLE");
        }
        for r in &self.requests {
            writeln!(
                out,
                " {}: {} (0x{:08x} {})",
                if r.is_load { "LOAD " } else { "STORE" },
                r.ticks_remaining,
                r.address,
                r.size
            )?;
        }
        Ok(())
    }
}

/// The main memory of the simulated core; the concrete timing model is fixed
/// at construction.
pub enum MainMemory {
    /// Every access completes in the same cycle.
    Ideal(IdealMemory),
    /// Accesses queue behind a burst-timing model.
    Delayed(DelayedMemory),
}

impl MainMemory {
    /// Builds a memory from its configuration.
    pub fn new(config: &MemoryConfig) -> Self {
        let store = IdealMemory::new(config.size, config.check, config.randomize);
        let timing = match config.kind {
            MemoryKind::Ideal => return MainMemory::Ideal(store),
            MemoryKind::Fixed => TimingModel::Fixed,
            MemoryKind::Variable => TimingModel::VariableBurst {
                page_bytes: config.page_bytes.max(config.burst_bytes),
            },
            MemoryKind::Tdm => TimingModel::Tdm {
                round_length: config.num_cores * config.burst_ticks + config.refresh_ticks,
                round_start: config.cpu_id * config.burst_ticks,
                round_counter: 0,
                transferring: false,
            },
        };
        MainMemory::Delayed(DelayedMemory::new(store, timing, config))
    }

    /// Builds an ideal scratchpad of `size` bytes with no checking.
    pub fn ideal(size: usize) -> Self {
        MainMemory::Ideal(IdealMemory::new(size, MemCheck::None, false))
    }

    /// A simulated access to the read port; `true` means the buffer is valid.
    pub fn read(&mut self, address: Uword, buf: &mut [u8], is_fetch: bool) -> SimResult<bool> {
        match self {
            MainMemory::Ideal(m) => m.read(address, buf),
            MainMemory::Delayed(m) => m.read(address, buf, is_fetch),
        }
    }

    /// A simulated access to the write port; `true` means the data is accepted.
    pub fn write(&mut self, address: Uword, buf: &[u8]) -> SimResult<bool> {
        match self {
            MainMemory::Ideal(m) => m.write(address, buf),
            MainMemory::Delayed(m) => m.write(address, buf),
        }
    }

    /// Reads without simulating timing or failing the init check.
    pub fn read_peek(&mut self, address: Uword, buf: &mut [u8]) -> SimResult<()> {
        match self {
            MainMemory::Ideal(m) => m.read_peek(address, buf),
            MainMemory::Delayed(m) => m.read_peek(address, buf),
        }
    }

    /// Writes without simulating timing.
    pub fn write_peek(&mut self, address: Uword, buf: &[u8]) -> SimResult<()> {
        match self {
            MainMemory::Ideal(m) => m.write_peek(address, buf),
            MainMemory::Delayed(m) => m.write_peek(address, buf),
        }
    }

    /// True when no request is outstanding.
    pub fn is_ready(&self) -> bool {
        match self {
            MainMemory::Ideal(_) => true,
            MainMemory::Delayed(m) => m.is_ready(),
        }
    }

    /// Advances the memory by one cycle.
    pub fn tick(&mut self) {
        if let MainMemory::Delayed(m) = self {
            m.tick();
        }
    }

    /// Size of the memory in bytes.
    pub fn size(&self) -> usize {
        match self {
            MainMemory::Ideal(m) => m.size(),
            MainMemory::Delayed(m) => m.store.size(),
        }
    }

    /// Transfer statistics, if this memory models timing.
    pub fn stats(&self) -> Option<&MemoryStats> {
        match self {
            MainMemory::Ideal(_) => None,
            MainMemory::Delayed(m) => Some(&m.stats),
        }
    }

    /// Dumps the request queue for the `all` debug format.
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        match self {
            MainMemory::Ideal(_) => writeln!(out, " IDLE"),
            MainMemory::Delayed(m) => m.dump(out),
        }
    }
}
