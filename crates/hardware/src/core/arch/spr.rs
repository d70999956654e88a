//! Special-purpose register file.
//!
//! Sixteen named slots (multiply low/high, decoupled-load destination, stack
//! top, cycle counter low/high, interrupt return PC). Indices outside the
//! file read as zero and ignore writes; slot 0 is the predicate view and is
//! handled by the `mts`/`mfs` semantics, not stored here.

use crate::common::data::Word;
use crate::common::reg::NUM_SPR;

/// The special-purpose register file.
pub struct Spr {
    regs: [Word; NUM_SPR],
}

impl Spr {
    /// Creates the file with all registers zero.
    pub fn new() -> Self {
        Self { regs: [0; NUM_SPR] }
    }

    /// Reads a special register; unused indices read as zero.
    #[inline]
    pub fn read(&self, idx: usize) -> Word {
        self.regs.get(idx).copied().unwrap_or(0)
    }

    /// Writes a special register; writes outside the file are ignored.
    #[inline]
    pub fn write(&mut self, idx: usize, value: Word) {
        if let Some(slot) = self.regs.get_mut(idx) {
            *slot = value;
        }
    }

    /// Dumps all registers for the debug formats.
    pub fn dump(&self, out: &mut dyn std::io::Write, pred_mask: u32) -> std::io::Result<()> {
        write!(out, "s0 : {:08x}   ", pred_mask)?;
        for (i, v) in self.regs.iter().enumerate().skip(1) {
            write!(out, "s{:<2}: {:08x}", i, v)?;
            if i % 8 == 7 {
                writeln!(out)?;
            } else {
                write!(out, "   ")?;
            }
        }
        writeln!(out)
    }
}

impl Default for Spr {
    fn default() -> Self {
        Self::new()
    }
}
