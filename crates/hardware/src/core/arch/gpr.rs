//! General-purpose register file and pipeline bypass slots.
//!
//! Thirty-two 32-bit registers; register 0 is hard-wired to zero. Reads in
//! the EX stage go through a chain of `Bypass` slots before falling back to
//! the register file, so back-to-back dependent instructions observe results
//! that have not been committed yet.

use crate::common::data::Word;
use crate::common::reg::NUM_GPR;

/// The general-purpose register file.
pub struct Gpr {
    regs: [Word; NUM_GPR],
}

impl Gpr {
    /// Creates a register file with all registers zero.
    pub fn new() -> Self {
        Self { regs: [0; NUM_GPR] }
    }

    /// Reads a register; `r0` always returns zero.
    #[inline]
    pub fn read(&self, idx: usize) -> Word {
        self.regs[idx]
    }

    /// Writes a register; writes to `r0` are ignored.
    #[inline]
    pub fn write(&mut self, idx: usize, value: Word) {
        if idx != 0 {
            self.regs[idx] = value;
        }
    }

    /// Dumps all registers for the debug formats.
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        for (i, v) in self.regs.iter().enumerate() {
            write!(out, "r{:<2}: {:08x}", i, v)?;
            if i % 8 == 7 {
                writeln!(out)?;
            } else {
                write!(out, "   ")?;
            }
        }
        Ok(())
    }
}

impl Default for Gpr {
    fn default() -> Self {
        Self::new()
    }
}

/// A register operand captured at decode: index plus the value read then.
#[derive(Clone, Copy, Debug, Default)]
pub struct GprOp {
    /// Register index the operand refers to.
    pub idx: u8,
    /// Value read from the register file at the DR stage.
    pub val: Word,
}

impl GprOp {
    /// Captures operand `idx` from the register file.
    pub fn read(gpr: &Gpr, idx: usize) -> Self {
        Self { idx: idx as u8, val: gpr.read(idx) }
    }
}

/// A single forwarding slot: an optional (register index, value) record.
///
/// An instruction deposits its result here at EX commit; the MW stage copies
/// it onward and finally writes the register file. Readers consult bypasses
/// in a fixed priority order before the register file.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bypass(Option<(u8, Word)>);

impl Bypass {
    /// Stores a pending register write; writes to `r0` are never forwarded.
    #[inline]
    pub fn set(&mut self, idx: u8, value: Word) {
        if idx != 0 {
            self.0 = Some((idx, value));
        }
    }

    /// Clears the slot.
    #[inline]
    pub fn reset(&mut self) {
        self.0 = None;
    }

    /// The pending write, if any.
    #[inline]
    pub fn get(&self) -> Option<(u8, Word)> {
        self.0
    }

    /// Forwards `value` for register `idx`, if this slot holds a newer write
    /// to the same register.
    #[inline]
    pub fn forward(&self, idx: u8, value: Word) -> Word {
        match self.0 {
            Some((i, v)) if i == idx => v,
            _ => value,
        }
    }
}
