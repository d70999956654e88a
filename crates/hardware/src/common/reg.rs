//! Register index constants and ABI roles.
//!
//! The core has three register files: 32 general-purpose registers, 8
//! predicate registers (readable in negated form), and 16 special-purpose
//! registers. This module pins down:
//! 1. **File sizes** used to dimension the register files.
//! 2. **ABI roles** of general registers (exit code, return base/offset).
//! 3. **Special register slots** (multiply result, decoupled-load destination,
//!    stack top, cycle counter, interrupt return).

/// Number of general-purpose registers.
pub const NUM_GPR: usize = 32;
/// Number of plain predicate registers (negated forms are views, not storage).
pub const NUM_PRR: usize = 8;
/// Number of special-purpose registers; unused indices read as zero.
pub const NUM_SPR: usize = 16;

/// General register holding the program's exit code on halt.
pub const GPR_EXIT_CODE: usize = 1;
/// First argument register (used by the `calls` debug format).
pub const GPR_FIRST_ARG: usize = 3;
/// Last argument register (used by the `calls` debug format).
pub const GPR_LAST_ARG: usize = 8;
/// Return function base register, written by calls.
pub const GPR_RFB: usize = 30;
/// Return function offset register, written by calls.
pub const GPR_RFO: usize = 31;

/// Special register: decoupled-load destination.
pub const SPR_SM: usize = 1;
/// Special register: multiply result, low word.
pub const SPR_SL: usize = 2;
/// Special register: multiply result, high word.
pub const SPR_SH: usize = 3;
/// Special register: stack top pointer.
pub const SPR_ST: usize = 6;
/// Special register: interrupt return PC.
pub const SPR_S9: usize = 9;
/// Special register: cycle counter, low word.
pub const SPR_SCL: usize = 10;
/// Special register: cycle counter, high word.
pub const SPR_SCH: usize = 11;

/// Predicate operand selector: low three bits index the predicate register,
/// bit 3 selects the negated reading. Predicate 0 is hard-wired to true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PredSel(pub u8);

impl PredSel {
    /// Selector for the always-true predicate `p0`.
    pub const ALWAYS: PredSel = PredSel(0);

    /// Index of the referenced predicate register.
    #[inline]
    pub fn index(self) -> usize {
        (self.0 & 0x7) as usize
    }

    /// True when the negated form is selected.
    #[inline]
    pub fn negated(self) -> bool {
        self.0 & 0x8 != 0
    }
}
