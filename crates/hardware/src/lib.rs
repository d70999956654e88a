//! Cycle-accurate Patmos core simulator library.
//!
//! This crate implements a single Patmos VLIW core with the following:
//! 1. **Core:** a dual-issue, in-order, four-stage pipeline (IF/DR/EX/MW)
//!    with predicated execution, bypass forwarding, and a decoupled-load
//!    side channel.
//! 2. **Caches:** a method-based instruction cache, a block-organized stack
//!    cache with automatic spill/fill, and data caches (ideal, no-cache,
//!    set-associative LRU).
//! 3. **Memory:** a big-endian backing store with fixed- or variable-latency
//!    burst models, TDM arbitration, and posted writes.
//! 4. **ISA:** decoding, per-stage semantics, and disassembly for the full
//!    opcode table.
//! 5. **Simulation:** the cycle loop, binary loader, symbol map, interrupt
//!    injection, debug tracing, and statistics collection.

/// Common types and constants (words, errors, register roles).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical structures).
pub mod config;
/// CPU core (registers, pipeline, cache units).
pub mod core;
/// Instruction set (table, decode, semantics, disassembly).
pub mod isa;
/// Simulation driver (cycle loop, loader, symbols, interrupts, trace).
pub mod sim;
/// Memory system (main and local memory models).
pub mod soc;
/// Retire and stall statistics.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The simulator core; construct with `Simulator::new`.
pub use crate::sim::Simulator;
