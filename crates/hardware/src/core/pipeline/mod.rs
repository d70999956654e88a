//! Pipeline stages and the in-flight instruction array.
//!
//! Four stages, two issue slots per stage. The simulator runs the stages
//! backward (MW, EX, DR, IF) in a read/compute pass and again in a commit
//! pass, then shifts the array according to the stall level resolved during
//! the cycle.

/// The instruction record and operand fields.
pub mod instruction;

pub use instruction::{InstrData, Operands};

use std::fmt;

/// Number of issue slots in a bundle.
pub const NUM_SLOTS: usize = 2;
/// Number of pipeline stages.
pub const NUM_STAGES: usize = 4;

/// Pipeline stage identifiers, in program order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Fetch the bundle from the instruction cache.
    Sif = 0,
    /// Decode the format and read register operands.
    Sdr = 1,
    /// Execute arithmetic and compute memory addresses.
    Sex = 2,
    /// Perform memory accesses and register writes.
    Smw = 3,
}

impl Stage {
    /// All stages in program order.
    pub const ALL: [Stage; NUM_STAGES] = [Stage::Sif, Stage::Sdr, Stage::Sex, Stage::Smw];

    /// Index of the stage in the pipeline array.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Sif => "IF",
            Stage::Sdr => "DR",
            Stage::Sex => "EX",
            Stage::Smw => "MW",
        };
        f.write_str(name)
    }
}

/// The two-dimensional array of in-flight instructions.
pub struct Pipeline {
    stages: [[InstrData; NUM_SLOTS]; NUM_STAGES],
}

impl Pipeline {
    /// Creates a pipeline full of bubbles.
    pub fn new() -> Self {
        Self { stages: [[InstrData::bubble(); NUM_SLOTS]; NUM_STAGES] }
    }

    /// The record at `stage`/`slot`.
    #[inline]
    pub fn slot(&self, stage: Stage, slot: usize) -> &InstrData {
        &self.stages[stage.index()][slot]
    }

    /// Mutable access to the record at `stage`/`slot`.
    #[inline]
    pub fn slot_mut(&mut self, stage: Stage, slot: usize) -> &mut InstrData {
        &mut self.stages[stage.index()][slot]
    }

    /// Removes the record at `stage`/`slot`, leaving a bubble.
    #[inline]
    pub fn take(&mut self, stage: Stage, slot: usize) -> InstrData {
        std::mem::take(&mut self.stages[stage.index()][slot])
    }

    /// Puts a record back at `stage`/`slot`.
    #[inline]
    pub fn put(&mut self, stage: Stage, slot: usize, data: InstrData) {
        self.stages[stage.index()][slot] = data;
    }

    /// Shifts the pipeline for the resolved `stall` level.
    ///
    /// Stages from EX down to the stall level are copied one stage forward;
    /// with the whole pipeline stalled (MW) nothing moves. The caller
    /// inserts the bubble at `stall + 1` or refills IF by fetching.
    pub fn advance(&mut self, stall: Stage) {
        for i in (stall.index()..=Stage::Sex.index()).rev() {
            self.stages[i + 1] = self.stages[i];
        }
    }

    /// Replaces both slots of `stage` with bubbles.
    pub fn set_bubble(&mut self, stage: Stage) {
        self.stages[stage.index()] = [InstrData::bubble(); NUM_SLOTS];
    }

    /// Clears the EX-stage bypasses so a stalled EX re-populates them.
    pub fn reset_ex_bypasses(&mut self) {
        for slot in &mut self.stages[Stage::Sex.index()] {
            slot.gpr_ex.reset();
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
