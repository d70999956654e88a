//! Bundle decoder.
//!
//! Instruction words are 32 bits. Bit 31 marks a two-word bundle: either a
//! second instruction issues in slot 1, or the first instruction is a long
//! ALU (`ALUl`) whose immediate occupies the second word. The remaining
//! fields are:
//!
//! ```text
//! [31] bundle  [30:27] predicate (bit 30 = negate)  [26:22] major opcode
//! register forms: [21:17] d  [16:12] s1  [11:7] s2  [6:0] minor
//! ALUi:           [21:17] d  [16:12] s1  [11:0] unsigned immediate
//! LDT:            [21:17] d  [16:12] ra  [11:7] minor  [6:0] signed imm
//! STT:            [21:17] minor  [16:12] ra  [11:7] rs  [6:0] signed imm
//! STC/CFLi:       [21:17] minor  [16:0] immediate (CFLi sign-extended)
//! ```
//!
//! A long instruction is only legal in slot 0 and only with the bundle bit
//! set. A decode result of length 0 signals an illegal instruction.

use crate::common::data::Uword;
use crate::common::reg::PredSel;
use crate::core::pipeline::{InstrData, Operands, NUM_SLOTS};
use crate::isa::{Instr, TABLE};

/// Major opcode groups.
mod major {
    pub const ALUI_BASE: u32 = 0; // majors 0..=7 select the ALUi operation
    pub const ALUL: u32 = 8;
    pub const ALUR: u32 = 9;
    pub const ALUU: u32 = 10;
    pub const ALUM: u32 = 11;
    pub const ALUC: u32 = 12;
    pub const ALUCI: u32 = 13;
    pub const ALUP: u32 = 14;
    pub const SPC: u32 = 15;
    pub const LDT: u32 = 16;
    pub const STT: u32 = 17;
    pub const STC: u32 = 18;
    pub const CFLI: u32 = 19;
    pub const CFLR: u32 = 20;
}

/// Sign-extends the low `bits` bits of `value`.
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Looks up a table entry by ID range start and minor offset.
fn entry(base: u16, minor: u32, count: u32) -> Option<&'static Instr> {
    if minor < count {
        Some(&TABLE[base as usize + minor as usize])
    } else {
        None
    }
}

/// The bundle decoder.
///
/// Stateless; the instruction table is static. Kept as a struct so the
/// simulator owns a decoder the way it owns its other units.
#[derive(Default)]
pub struct Decoder;

/// Result of decoding a single slot.
struct Slot {
    instr: &'static Instr,
    ops: Operands,
    pred: PredSel,
    is_long: bool,
}

impl Decoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decodes one slot word; `imm` is the following word (ALUl immediate).
    fn decode_slot(&self, iw: Uword, imm: Uword) -> Option<Slot> {
        let pred = PredSel(((iw >> 27) & 0xf) as u8);
        let major = (iw >> 22) & 0x1f;
        let d = ((iw >> 17) & 0x1f) as u8;
        let s1 = ((iw >> 12) & 0x1f) as u8;
        let s2 = ((iw >> 7) & 0x1f) as u8;
        let minor7 = iw & 0x7f;

        let mut ops = Operands { d, s1, s2, imm: 0 };
        let mut is_long = false;

        let instr = match major {
            m if m < 8 => {
                // ALUi: the major selects the operation
                ops.imm = (iw & 0xfff) as i32;
                entry(0, m - major::ALUI_BASE, 8)?
            }
            major::ALUL => {
                ops.imm = imm as i32;
                is_long = true;
                // minors follow the ALUi numbering, then nor/shadd/shadd2
                match minor7 {
                    0..=7 => entry(8, minor7, 8)?,
                    11 => &TABLE[16],
                    12 => &TABLE[17],
                    13 => &TABLE[18],
                    _ => return None,
                }
            }
            major::ALUR => match minor7 {
                0 => &TABLE[19],
                1 => &TABLE[20],
                2 => &TABLE[22],
                3 => &TABLE[23],
                4 => &TABLE[24],
                5 => &TABLE[25],
                6 => &TABLE[26],
                7 => &TABLE[27],
                8 => &TABLE[21],  // rsub
                9 => &TABLE[28],  // rl
                10 => &TABLE[29], // rr
                11 => &TABLE[30], // nor
                12 => &TABLE[31], // shadd
                13 => &TABLE[32], // shadd2
                _ => return None,
            },
            major::ALUU => entry(33, minor7, 4)?,
            major::ALUM => entry(37, minor7, 2)?,
            major::ALUC => entry(39, minor7, 7)?,
            major::ALUCI => {
                ops.imm = ((iw >> 7) & 0x1f) as i32;
                entry(46, minor7, 7)?
            }
            major::ALUP => entry(53, minor7, 4)?,
            major::SPC => entry(57, minor7, 3)?,
            major::LDT => {
                ops.imm = sign_extend(iw & 0x7f, 7);
                entry(60, (iw >> 7) & 0x1f, 30)?
            }
            major::STT => {
                ops.imm = sign_extend(iw & 0x7f, 7);
                entry(90, (iw >> 17) & 0x1f, 12)?
            }
            major::STC => {
                ops.imm = (iw & 0x1ffff) as i32;
                entry(102, (iw >> 17) & 0x3, 3)?
            }
            major::CFLI => {
                ops.imm = sign_extend(iw & 0x1ffff, 17);
                entry(105, (iw >> 17) & 0x3, 3)?
            }
            major::CFLR => entry(108, (iw >> 17) & 0x3, 4)?,
            _ => return None,
        };

        Some(Slot { instr, ops, pred, is_long })
    }

    fn fill(&self, out: &mut InstrData, slot: Slot) {
        *out = InstrData::bubble();
        out.instr = Some(slot.instr);
        out.pred = slot.pred;
        out.ops = slot.ops;
    }

    /// Decodes a fetched bundle into the IF stage records.
    ///
    /// Returns the bundle length in words: 1 for a single-slot bundle, 2 for
    /// a dual-slot bundle or a long instruction, 0 for an illegal encoding.
    pub fn decode(&self, iw: &[Uword; NUM_SLOTS], out: &mut [InstrData; NUM_SLOTS]) -> usize {
        let Some(first) = self.decode_slot(iw[0], iw[1]) else {
            return 0;
        };
        let bundled = iw[0] & 0x8000_0000 != 0;
        let is_long = first.is_long;
        self.fill(&mut out[0], first);

        if is_long {
            // a long instruction requires the bundle bit and fills both slots
            if !bundled {
                return 0;
            }
            out[1] = InstrData::bubble();
            return 2;
        }
        if !bundled {
            out[1] = InstrData::bubble();
            return 1;
        }
        match self.decode_slot(iw[1], 0) {
            Some(second) if !second.is_long => {
                self.fill(&mut out[1], second);
                2
            }
            _ => 0,
        }
    }
}
