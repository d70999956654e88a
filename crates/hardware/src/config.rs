//! Configuration system for the Patmos simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the simulator. It provides:
//! 1. **Defaults:** baseline hardware constants (memory sizes, cache geometry).
//! 2. **Structures:** hierarchical config for general, memory, data cache,
//!    instruction cache, and stack cache parameters.
//! 3. **Enums:** memory timing model, cache kind, and memory-check policy.
//!
//! Configuration is supplied as JSON by the CLI, or use `Config::default()`.

use serde::Deserialize;

/// Default configuration constants for the simulator.
///
/// These values define the baseline hardware configuration when not
/// explicitly overridden.
mod defaults {
    /// Number of bytes of global main memory (64 MiB).
    pub const MEMORY_BYTES: usize = 0x400_0000;

    /// Number of bytes of the local scratchpad memory (2 KiB).
    pub const LOCAL_MEMORY_BYTES: usize = 0x800;

    /// Number of bytes transferred per memory burst.
    pub const BURST_BYTES: u32 = 16;

    /// Number of cycles per memory burst.
    pub const BURST_TICKS: u32 = 21;

    /// Additional delay in cycles before read data becomes available.
    pub const READ_DELAY_TICKS: u32 = 0;

    /// Number of bytes per page of the variable-burst memory model (1 KiB).
    pub const PAGE_BYTES: u32 = 1024;

    /// Number of cores sharing a TDM memory round.
    pub const NUM_CORES: u32 = 4;

    /// Refresh cycles appended to every TDM round.
    pub const REFRESH_TICKS: u32 = 0;

    /// Data cache size in bytes (2 KiB).
    pub const DATA_CACHE_BYTES: usize = 2048;

    /// Data cache line size in bytes.
    pub const DATA_CACHE_LINE_BYTES: usize = 16;

    /// Method cache size in blocks.
    pub const METHOD_CACHE_BLOCKS: usize = 16;

    /// Method cache block size in bytes.
    pub const METHOD_CACHE_BLOCK_BYTES: usize = 32;

    /// Number of blocks fetched when the method cache is initialized.
    pub const METHOD_CACHE_INIT_BLOCKS: usize = 4;

    /// Stack cache size in blocks.
    pub const STACK_CACHE_BLOCKS: usize = 64;

    /// Stack cache block size in bytes.
    pub const STACK_CACHE_BLOCK_BYTES: usize = 4;

    /// Total stack size limit in blocks, including spilled data.
    pub const STACK_TOTAL_BLOCKS: usize = 1024;

    /// Default program entry point: a raw image carries the entry method's
    /// size word at offset 0 and its code from offset 4.
    pub const ENTRY: u32 = 4;
}

/// Main memory timing models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Single-cycle memory; every access is ready immediately.
    #[default]
    Ideal,
    /// Fixed-delay burst memory with a request queue and posted writes.
    Fixed,
    /// Variable-burst memory; requests pay per crossed page plus per word.
    Variable,
    /// Time-division-multiplexed memory; the queue head only advances
    /// within this core's slot of a globally periodic round.
    Tdm,
}

/// Data cache organizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCacheKind {
    /// Perfect cache: all accesses hit, no timing.
    #[default]
    Ideal,
    /// No cache: every access goes straight to memory with full timing.
    #[serde(alias = "none")]
    No,
    /// Two-way set-associative cache with LRU replacement.
    Lru2,
    /// Four-way set-associative cache with LRU replacement.
    Lru4,
    /// Eight-way set-associative cache with LRU replacement.
    Lru8,
}

impl DataCacheKind {
    /// Associativity of the cache kind; zero for the non-caching kinds.
    pub fn ways(self) -> usize {
        match self {
            DataCacheKind::Ideal | DataCacheKind::No => 0,
            DataCacheKind::Lru2 => 2,
            DataCacheKind::Lru4 => 4,
            DataCacheKind::Lru8 => 8,
        }
    }
}

/// Instruction cache front-end kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrCacheKind {
    /// Method cache: whole methods are cached, keyed by base address.
    #[default]
    MCache,
    /// Conventional instruction cache backed by a data cache.
    ICache,
}

/// Method cache replacement policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodCachePolicy {
    /// All methods are always resident; fetches never miss.
    Ideal,
    /// Evict the least-recently-dispatched method.
    #[default]
    Lru,
    /// Evict methods in insertion order.
    Fifo,
}

/// Stack cache organizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackCacheKind {
    /// Unbounded stack cache; reserve and ensure never spill.
    Ideal,
    /// Block-organized cache with automatic spill and fill.
    #[default]
    Block,
}

/// Policy for reads of memory bytes that were never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemCheck {
    /// No checking.
    #[default]
    None,
    /// Warn when any byte read is uninitialized.
    Warn,
    /// Warn only when all bytes read are uninitialized.
    #[serde(alias = "warn-addr")]
    WarnAddr,
    /// Fail when any byte read is uninitialized.
    Error,
    /// Fail only when all bytes read are uninitialized.
    #[serde(alias = "error-addr")]
    ErrorAddr,
}

impl MemCheck {
    /// True when only the all-bytes-uninitialized case triggers.
    pub fn address_only(self) -> bool {
        matches!(self, MemCheck::WarnAddr | MemCheck::ErrorAddr)
    }

    /// True when the policy warns instead of failing.
    pub fn warns(self) -> bool {
        matches!(self, MemCheck::Warn | MemCheck::WarnAddr)
    }
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use patmos_core::config::{Config, DataCacheKind, MemoryKind};
///
/// let json = r#"{
///     "general": { "entry": 4 },
///     "memory": { "kind": "fixed", "burst_bytes": 16, "burst_ticks": 8 },
///     "dcache": { "kind": "lru4", "size_bytes": 4096 }
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.memory.kind, MemoryKind::Fixed);
/// assert_eq!(config.dcache.kind, DataCacheKind::Lru4);
/// assert_eq!(config.stack.block_bytes, 4);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Main memory configuration.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Local scratchpad memory configuration.
    #[serde(default)]
    pub local: LocalMemoryConfig,
    /// Data cache configuration.
    #[serde(default)]
    pub dcache: DataCacheConfig,
    /// Instruction/method cache configuration.
    #[serde(default)]
    pub icache: InstrCacheConfig,
    /// Stack cache configuration.
    #[serde(default)]
    pub stack: StackCacheConfig,
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Program entry point.
    #[serde(default = "GeneralConfig::default_entry")]
    pub entry: u32,

    /// Report statistics per issue slot instead of summed.
    #[serde(default)]
    pub slot_stats: bool,
}

impl GeneralConfig {
    fn default_entry() -> u32 {
        defaults::ENTRY
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { entry: defaults::ENTRY, slot_stats: false }
    }
}

/// Main memory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Timing model.
    #[serde(default)]
    pub kind: MemoryKind,

    /// Memory size in bytes.
    #[serde(default = "MemoryConfig::default_size")]
    pub size: usize,

    /// Bytes per burst; requests are aligned to this granularity.
    #[serde(default = "MemoryConfig::default_burst_bytes")]
    pub burst_bytes: u32,

    /// Cycles per burst.
    #[serde(default = "MemoryConfig::default_burst_ticks")]
    pub burst_ticks: u32,

    /// Additional read latency in cycles.
    #[serde(default = "MemoryConfig::default_read_delay")]
    pub read_delay_ticks: u32,

    /// Maximum number of outstanding posted writes; zero disables posting.
    #[serde(default)]
    pub posted_writes: usize,

    /// Page size of the variable-burst model.
    #[serde(default = "MemoryConfig::default_page_bytes")]
    pub page_bytes: u32,

    /// Number of cores sharing the TDM round.
    #[serde(default = "MemoryConfig::default_num_cores")]
    pub num_cores: u32,

    /// This core's identifier within the TDM round.
    #[serde(default)]
    pub cpu_id: u32,

    /// Refresh cycles appended to every TDM round.
    #[serde(default = "MemoryConfig::default_refresh_ticks")]
    pub refresh_ticks: u32,

    /// Uninitialized-read policy.
    #[serde(default)]
    pub check: MemCheck,

    /// Initialize fresh memory with pseudo-random bytes instead of zeros.
    #[serde(default)]
    pub randomize: bool,
}

impl MemoryConfig {
    fn default_size() -> usize {
        defaults::MEMORY_BYTES
    }
    fn default_burst_bytes() -> u32 {
        defaults::BURST_BYTES
    }
    fn default_burst_ticks() -> u32 {
        defaults::BURST_TICKS
    }
    fn default_read_delay() -> u32 {
        defaults::READ_DELAY_TICKS
    }
    fn default_page_bytes() -> u32 {
        defaults::PAGE_BYTES
    }
    fn default_num_cores() -> u32 {
        defaults::NUM_CORES
    }
    fn default_refresh_ticks() -> u32 {
        defaults::REFRESH_TICKS
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            kind: MemoryKind::default(),
            size: defaults::MEMORY_BYTES,
            burst_bytes: defaults::BURST_BYTES,
            burst_ticks: defaults::BURST_TICKS,
            read_delay_ticks: defaults::READ_DELAY_TICKS,
            posted_writes: 0,
            page_bytes: defaults::PAGE_BYTES,
            num_cores: defaults::NUM_CORES,
            cpu_id: 0,
            refresh_ticks: defaults::REFRESH_TICKS,
            check: MemCheck::default(),
            randomize: false,
        }
    }
}

/// Local scratchpad memory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalMemoryConfig {
    /// Scratchpad size in bytes.
    #[serde(default = "LocalMemoryConfig::default_size")]
    pub size: usize,
}

impl LocalMemoryConfig {
    fn default_size() -> usize {
        defaults::LOCAL_MEMORY_BYTES
    }
}

impl Default for LocalMemoryConfig {
    fn default() -> Self {
        Self { size: defaults::LOCAL_MEMORY_BYTES }
    }
}

/// Data cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DataCacheConfig {
    /// Cache organization.
    #[serde(default)]
    pub kind: DataCacheKind,

    /// Total cache size in bytes.
    #[serde(default = "DataCacheConfig::default_size")]
    pub size_bytes: usize,

    /// Cache line size in bytes.
    #[serde(default = "DataCacheConfig::default_line")]
    pub line_bytes: usize,
}

impl DataCacheConfig {
    fn default_size() -> usize {
        defaults::DATA_CACHE_BYTES
    }
    fn default_line() -> usize {
        defaults::DATA_CACHE_LINE_BYTES
    }
}

impl Default for DataCacheConfig {
    fn default() -> Self {
        Self {
            kind: DataCacheKind::default(),
            size_bytes: defaults::DATA_CACHE_BYTES,
            line_bytes: defaults::DATA_CACHE_LINE_BYTES,
        }
    }
}

/// Instruction/method cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrCacheConfig {
    /// Front-end kind: method cache or data-cache-backed instruction cache.
    #[serde(default)]
    pub kind: InstrCacheKind,

    /// Method cache replacement policy.
    #[serde(default)]
    pub policy: MethodCachePolicy,

    /// Method cache size in blocks.
    #[serde(default = "InstrCacheConfig::default_blocks")]
    pub num_blocks: usize,

    /// Method cache block size in bytes.
    #[serde(default = "InstrCacheConfig::default_block_bytes")]
    pub block_bytes: usize,

    /// Blocks fetched by `initialize` for the entry method.
    #[serde(default = "InstrCacheConfig::default_init_blocks")]
    pub init_blocks: usize,

    /// Backing data cache for the `ICache` kind.
    #[serde(default)]
    pub backing: DataCacheConfig,
}

impl InstrCacheConfig {
    fn default_blocks() -> usize {
        defaults::METHOD_CACHE_BLOCKS
    }
    fn default_block_bytes() -> usize {
        defaults::METHOD_CACHE_BLOCK_BYTES
    }
    fn default_init_blocks() -> usize {
        defaults::METHOD_CACHE_INIT_BLOCKS
    }
}

impl Default for InstrCacheConfig {
    fn default() -> Self {
        Self {
            kind: InstrCacheKind::default(),
            policy: MethodCachePolicy::default(),
            num_blocks: defaults::METHOD_CACHE_BLOCKS,
            block_bytes: defaults::METHOD_CACHE_BLOCK_BYTES,
            init_blocks: defaults::METHOD_CACHE_INIT_BLOCKS,
            backing: DataCacheConfig::default(),
        }
    }
}

/// Stack cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StackCacheConfig {
    /// Cache organization.
    #[serde(default)]
    pub kind: StackCacheKind,

    /// On-cache capacity in blocks.
    #[serde(default = "StackCacheConfig::default_blocks")]
    pub num_blocks: usize,

    /// Block size in bytes.
    #[serde(default = "StackCacheConfig::default_block_bytes")]
    pub block_bytes: usize,

    /// Total stack limit in blocks, including data spilled to memory.
    #[serde(default = "StackCacheConfig::default_total")]
    pub total_blocks: usize,
}

impl StackCacheConfig {
    fn default_blocks() -> usize {
        defaults::STACK_CACHE_BLOCKS
    }
    fn default_block_bytes() -> usize {
        defaults::STACK_CACHE_BLOCK_BYTES
    }
    fn default_total() -> usize {
        defaults::STACK_TOTAL_BLOCKS
    }
}

impl Default for StackCacheConfig {
    fn default() -> Self {
        Self {
            kind: StackCacheKind::default(),
            num_blocks: defaults::STACK_CACHE_BLOCKS,
            block_bytes: defaults::STACK_CACHE_BLOCK_BYTES,
            total_blocks: defaults::STACK_TOTAL_BLOCKS,
        }
    }
}
