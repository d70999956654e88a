//! Patmos cycle-accurate simulator CLI.
//!
//! This binary loads a flat binary image into the simulated main memory,
//! configures the memory and cache hierarchy from flags and an optional JSON
//! config file, runs the core until it halts (or the cycle limit is
//! reached), prints the statistics report, and exits with the simulated
//! program's exit code.

mod report;

use clap::Parser;
use std::process;

use patmos_core::common::data::Uword;
use patmos_core::common::error::ExceptionKind;
use patmos_core::config::{
    Config, DataCacheKind, InstrCacheKind, MemCheck, MemoryKind, MethodCachePolicy,
    StackCacheKind,
};
use patmos_core::sim::{loader, DebugFmt, Simulator, SymbolMap, Tracer};

/// Parses a byte size with an optional `k`/`m`/`g` suffix (also `kb` etc.).
fn parse_byte_size(s: &str) -> Result<u64, String> {
    let lower = s.to_ascii_lowercase();
    let (digits, shift) = if let Some(v) = lower.strip_suffix("kb").or(lower.strip_suffix('k')) {
        (v, 10)
    } else if let Some(v) = lower.strip_suffix("mb").or(lower.strip_suffix('m')) {
        (v, 20)
    } else if let Some(v) = lower.strip_suffix("gb").or(lower.strip_suffix('g')) {
        (v, 30)
    } else {
        (lower.as_str(), 0)
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    Ok(value << shift)
}

/// Parses a decimal or `0x`-prefixed address.
fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or(s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("invalid address: {}", s))
}

#[derive(Parser, Debug)]
#[command(
    name = "pasim",
    author,
    version,
    about = "Patmos cycle-accurate simulator",
    long_about = "Simulate a Patmos binary image.\n\nSizes accept k/m/g suffixes. \
                  A JSON config file (-c) supplies defaults; flags override it.\n\n\
                  Examples:\n  pasim program.bin\n  pasim -m fixed --tdelay 8 -d lru4 program.bin\n  \
                  pasim --debug 0 --debug-fmt trace program.bin"
)]
struct Cli {
    /// Binary image to simulate.
    binary: String,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Program entry point (decimal or 0x-prefixed).
    #[arg(short, long, value_parser = parse_address)]
    entry: Option<u64>,

    /// Maximum number of cycles to simulate.
    #[arg(long, default_value_t = u64::MAX)]
    maxc: u64,

    /// Symbols file: one `address size name` line per symbol.
    #[arg(short = 's', long)]
    symbols: Option<String>,

    /// Main memory size.
    #[arg(short = 'g', long, value_parser = parse_byte_size)]
    gsize: Option<u64>,

    /// Local memory size.
    #[arg(short = 'l', long, value_parser = parse_byte_size)]
    lsize: Option<u64>,

    /// Main memory kind: ideal, fixed, variable, tdm.
    #[arg(short = 'm', long)]
    memory: Option<String>,

    /// Memory burst size in bytes.
    #[arg(short = 'b', long, value_parser = parse_byte_size)]
    bsize: Option<u64>,

    /// Memory cycles per burst.
    #[arg(long)]
    tdelay: Option<u32>,

    /// Additional read delay in cycles.
    #[arg(long)]
    rdelay: Option<u32>,

    /// Maximum outstanding posted writes.
    #[arg(long)]
    posted: Option<usize>,

    /// Page size of the variable-burst memory.
    #[arg(long, value_parser = parse_byte_size)]
    psize: Option<u64>,

    /// Number of cores sharing a TDM round.
    #[arg(long)]
    cores: Option<u32>,

    /// This core's index in the TDM round.
    #[arg(long)]
    cpuid: Option<u32>,

    /// Refresh cycles per TDM round.
    #[arg(long)]
    refresh: Option<u32>,

    /// Data cache kind: ideal, no, lru2, lru4, lru8.
    #[arg(short = 'd', long)]
    dcache: Option<String>,

    /// Data cache size.
    #[arg(long, value_parser = parse_byte_size)]
    dcsize: Option<u64>,

    /// Data cache line size.
    #[arg(long, value_parser = parse_byte_size)]
    dlsize: Option<u64>,

    /// Instruction cache kind: mcache, icache.
    #[arg(short = 'i', long)]
    icache: Option<String>,

    /// Method cache policy: ideal, lru, fifo.
    #[arg(long)]
    mcache: Option<String>,

    /// Method cache size in blocks.
    #[arg(long)]
    mcsize: Option<usize>,

    /// Method cache block size.
    #[arg(long, value_parser = parse_byte_size)]
    mbsize: Option<u64>,

    /// Stack cache kind: ideal, block.
    #[arg(short = 'S', long)]
    scache: Option<String>,

    /// Stack cache size in blocks.
    #[arg(long)]
    scsize: Option<usize>,

    /// Total stack limit in blocks, including spilled data.
    #[arg(long)]
    stotal: Option<usize>,

    /// Uninitialized-read policy: none, warn, warn-addr, error, error-addr.
    #[arg(long)]
    mem_check: Option<String>,

    /// Initialize fresh memory with pseudo-random bytes.
    #[arg(long)]
    randomize: bool,

    /// Print debug output starting at the given cycle.
    #[arg(long)]
    debug: Option<u64>,

    /// Debug output format: short, trace, instructions, blocks, calls,
    /// default, long, all.
    #[arg(long, default_value = "default")]
    debug_fmt: String,

    /// Report statistics per issue slot.
    #[arg(long)]
    slot_stats: bool,

    /// Suppress the statistics report.
    #[arg(short, long)]
    quiet: bool,
}

fn fail(msg: String) -> ! {
    eprintln!("pasim: {}", msg);
    process::exit(1)
}

/// Builds the configuration from the optional file and the flag overrides.
fn build_config(cli: &Cli) -> Config {
    let mut config: Config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .unwrap_or_else(|e| fail(format!("cannot read {}: {}", path, e)));
            serde_json::from_str(&text)
                .unwrap_or_else(|e| fail(format!("bad config {}: {}", path, e)))
        }
        None => Config::default(),
    };

    if let Some(entry) = cli.entry {
        config.general.entry = entry as u32;
    }
    config.general.slot_stats |= cli.slot_stats;

    if let Some(size) = cli.gsize {
        config.memory.size = size as usize;
    }
    if let Some(size) = cli.lsize {
        config.local.size = size as usize;
    }
    if let Some(kind) = &cli.memory {
        config.memory.kind = match kind.as_str() {
            "ideal" => MemoryKind::Ideal,
            "fixed" => MemoryKind::Fixed,
            "variable" => MemoryKind::Variable,
            "tdm" => MemoryKind::Tdm,
            other => fail(format!("unknown memory kind: {}", other)),
        };
    }
    if let Some(bytes) = cli.bsize {
        config.memory.burst_bytes = bytes as u32;
    }
    if let Some(ticks) = cli.tdelay {
        config.memory.burst_ticks = ticks;
    }
    if let Some(ticks) = cli.rdelay {
        config.memory.read_delay_ticks = ticks;
    }
    if let Some(posted) = cli.posted {
        config.memory.posted_writes = posted;
    }
    if let Some(bytes) = cli.psize {
        config.memory.page_bytes = bytes as u32;
    }
    if let Some(cores) = cli.cores {
        config.memory.num_cores = cores;
    }
    if let Some(id) = cli.cpuid {
        config.memory.cpu_id = id;
    }
    if let Some(ticks) = cli.refresh {
        config.memory.refresh_ticks = ticks;
    }
    if let Some(check) = &cli.mem_check {
        config.memory.check = match check.as_str() {
            "none" => MemCheck::None,
            "warn" => MemCheck::Warn,
            "warn-addr" => MemCheck::WarnAddr,
            "error" => MemCheck::Error,
            "error-addr" => MemCheck::ErrorAddr,
            other => fail(format!("unknown memory check policy: {}", other)),
        };
    }
    config.memory.randomize |= cli.randomize;

    if let Some(kind) = &cli.dcache {
        config.dcache.kind = match kind.as_str() {
            "ideal" => DataCacheKind::Ideal,
            "no" => DataCacheKind::No,
            "lru2" => DataCacheKind::Lru2,
            "lru4" => DataCacheKind::Lru4,
            "lru8" => DataCacheKind::Lru8,
            other => fail(format!("unknown data cache kind: {}", other)),
        };
    }
    if let Some(size) = cli.dcsize {
        config.dcache.size_bytes = size as usize;
    }
    if let Some(size) = cli.dlsize {
        config.dcache.line_bytes = size as usize;
    }

    if let Some(kind) = &cli.icache {
        config.icache.kind = match kind.as_str() {
            "mcache" => InstrCacheKind::MCache,
            "icache" => InstrCacheKind::ICache,
            other => fail(format!("unknown instruction cache kind: {}", other)),
        };
    }
    if let Some(policy) = &cli.mcache {
        config.icache.policy = match policy.as_str() {
            "ideal" => MethodCachePolicy::Ideal,
            "lru" => MethodCachePolicy::Lru,
            "fifo" => MethodCachePolicy::Fifo,
            other => fail(format!("unknown method cache policy: {}", other)),
        };
    }
    if let Some(blocks) = cli.mcsize {
        config.icache.num_blocks = blocks;
    }
    if let Some(bytes) = cli.mbsize {
        config.icache.block_bytes = bytes as usize;
    }

    if let Some(kind) = &cli.scache {
        config.stack.kind = match kind.as_str() {
            "ideal" => StackCacheKind::Ideal,
            "block" => StackCacheKind::Block,
            other => fail(format!("unknown stack cache kind: {}", other)),
        };
    }
    if let Some(blocks) = cli.scsize {
        config.stack.num_blocks = blocks;
    }
    if let Some(blocks) = cli.stotal {
        config.stack.total_blocks = blocks;
    }

    config
}

/// Reads a symbols file: one `address size name` line per symbol, addresses
/// decimal or 0x-prefixed, `#` starts a comment.
fn load_symbols(path: &str) -> SymbolMap {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("cannot read {}: {}", path, e)));
    let mut map = SymbolMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(addr), Some(size), Some(name)) = (fields.next(), fields.next(), fields.next())
        else {
            fail(format!("{}:{}: expected `address size name`", path, lineno + 1));
        };
        let addr = parse_address(addr).unwrap_or_else(|e| fail(format!("{}:{}: {}", path, lineno + 1, e)));
        let size = parse_address(size).unwrap_or_else(|e| fail(format!("{}:{}: {}", path, lineno + 1, e)));
        map.add(addr as Uword, size as Uword, name);
    }
    map.sort();
    map
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config = build_config(&cli);

    let debug_fmt: DebugFmt = cli
        .debug_fmt
        .parse()
        .unwrap_or_else(|e: String| fail(e));

    let mut sim = Simulator::new(&config);
    if let Some(path) = &cli.symbols {
        sim.symbols = load_symbols(path);
    }

    let image = loader::load_file(&cli.binary)
        .unwrap_or_else(|e| fail(format!("cannot read {}: {}", cli.binary, e)));
    if let Err(e) = loader::load_image(&mut sim.memory, &image, 0) {
        fail(format!("cannot load image: {}", e));
    }

    let entry = config.general.entry;
    let mut stderr = std::io::stderr();
    let mut tracer_storage;
    let tracer = match cli.debug {
        Some(start) => {
            tracer_storage = Tracer::new(&mut stderr, debug_fmt, start);
            Some(&mut tracer_storage)
        }
        None => None,
    };

    let result = sim.run(entry, cli.maxc, tracer);

    match result {
        Ok(()) => {
            log::info!("cycle limit reached after {} cycles", sim.cycle);
            if !cli.quiet {
                report::print_report(&sim, config.general.slot_stats);
            }
        }
        Err(e) => match &e.kind {
            ExceptionKind::Halt(exit_code) => {
                if !cli.quiet {
                    report::print_report(&sim, config.general.slot_stats);
                }
                process::exit(*exit_code as i32);
            }
            _ => {
                eprintln!("pasim: {}", e);
                if !cli.quiet {
                    report::print_report(&sim, config.general.slot_stats);
                }
                process::exit(1);
            }
        },
    }
}
