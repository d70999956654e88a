//! Retire and stall statistics of the core.
//!
//! The core only maintains counters; rendering lives with the caller. Per
//! cycle, exactly one stall-level counter is incremented, so the counters
//! always sum to the cycle count. Per retired slot, exactly one of
//! retired/discarded is incremented for an instruction (depending on its
//! latched predicate), or the bubble counter otherwise.

use crate::core::pipeline::{NUM_SLOTS, NUM_STAGES};
use crate::isa;

/// Counters for one instruction in one issue slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstrStat {
    /// Times the instruction was fetched into this slot.
    pub fetched: u64,
    /// Times it reached MW with its predicate true.
    pub retired: u64,
    /// Times it reached MW with its predicate false.
    pub discarded: u64,
}

/// Statistics kept by the simulator core.
pub struct SimStats {
    /// Per-slot, per-instruction counters, indexed by instruction ID.
    pub instrs: [Vec<InstrStat>; NUM_SLOTS],
    /// Bubbles leaving the pipeline per slot.
    pub bubbles_retired: [u64; NUM_SLOTS],
    /// Cycles spent at each stall level; index 0 is the unstalled case.
    pub stall_cycles: [u64; NUM_STAGES],
}

impl SimStats {
    /// Creates zeroed statistics dimensioned for the instruction table.
    pub fn new() -> Self {
        Self {
            instrs: std::array::from_fn(|_| vec![InstrStat::default(); isa::num_instructions()]),
            bubbles_retired: [0; NUM_SLOTS],
            stall_cycles: [0; NUM_STAGES],
        }
    }

    /// Sum of all stall-level counters; equals the cycle count.
    pub fn total_cycles(&self) -> u64 {
        self.stall_cycles.iter().sum()
    }
}

impl Default for SimStats {
    fn default() -> Self {
        Self::new()
    }
}
