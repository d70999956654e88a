//! Rendering of decoded instructions.
//!
//! One line per slot, in the operand syntax of the assembler:
//! `(p1) add r3 = r4, r5`, with symbol annotation for resolved addresses.

use std::fmt::Write;

use crate::common::reg::PredSel;
use crate::core::pipeline::InstrData;
use crate::isa::InstrKind;
use crate::sim::symbols::SymbolMap;

fn pred_prefix(pred: PredSel) -> String {
    if pred.negated() {
        format!("(!p{}) ", pred.index())
    } else {
        format!("(p{}) ", pred.index())
    }
}

/// Renders one in-flight instruction, annotating the computed address with
/// its symbol where one is known.
pub fn disasm(record: &InstrData, symbols: &SymbolMap) -> String {
    let Some(instr) = record.instr else {
        return "nop".to_string();
    };
    let mut out = pred_prefix(record.pred);
    let ops = &record.ops;
    let name = instr.name;

    match instr.kind {
        InstrKind::AluImm(_) | InstrKind::AluLong(_) => {
            let _ = write!(out, "{} r{} = r{}, {}", name, ops.d, ops.s1, ops.imm);
        }
        InstrKind::AluReg(_) => {
            let _ = write!(out, "{} r{} = r{}, r{}", name, ops.d, ops.s1, ops.s2);
        }
        InstrKind::AluUnary(_) => {
            let _ = write!(out, "{} r{} = r{}", name, ops.d, ops.s1);
        }
        InstrKind::AluMul { .. } => {
            let _ = write!(out, "{} r{}, r{}", name, ops.s1, ops.s2);
        }
        InstrKind::CmpReg(_) => {
            let _ = write!(out, "{} p{} = r{}, r{}", name, ops.d & 0x7, ops.s1, ops.s2);
        }
        InstrKind::CmpImm(_) => {
            let _ = write!(out, "{} p{} = r{}, {}", name, ops.d & 0x7, ops.s1, ops.imm);
        }
        InstrKind::PredCombine(_) => {
            let _ = write!(out, "{} p{} = p{}, p{}", name, ops.d & 0x7, ops.s1, ops.s2);
        }
        InstrKind::WaitMem => {
            let _ = write!(out, "{}", name);
        }
        InstrKind::MoveToSpecial => {
            let _ = write!(out, "{} s{} = r{}", name, ops.d, ops.s1);
        }
        InstrKind::MoveFromSpecial => {
            let _ = write!(out, "{} r{} = s{}", name, ops.d, ops.s1);
        }
        InstrKind::Load { .. } => {
            let _ = write!(out, "{} r{} = [r{} + {}]", name, ops.d, ops.s1, ops.imm);
            let _ = write!(out, "{}", symbols.annotate(record.ex_address));
        }
        InstrKind::DecoupledLoad { .. } => {
            let _ = write!(out, "{} sm = [r{} + {}]", name, ops.s1, ops.imm);
        }
        InstrKind::Store { .. } => {
            let _ = write!(out, "{} [r{} + {}] = r{}", name, ops.s1, ops.imm, ops.s2);
            let _ = write!(out, "{}", symbols.annotate(record.ex_address));
        }
        InstrKind::StackCtrl(_) => {
            let _ = write!(out, "{} {}", name, ops.imm);
        }
        InstrKind::CallImm | InstrKind::BranchImm | InstrKind::BranchCfImm => {
            let _ = write!(out, "{} {}", name, ops.imm);
            let _ = write!(out, "{}", symbols.annotate(record.ex_address));
        }
        InstrKind::CallReg | InstrKind::BranchReg | InstrKind::BranchCfReg => {
            let _ = write!(out, "{} r{}", name, ops.s1);
            let _ = write!(out, "{}", symbols.annotate(record.ex_address));
        }
        InstrKind::Return => {
            let _ = write!(out, "{} r{}, r{}", name, ops.s1, ops.s2);
        }
        InstrKind::InterruptDispatch => {
            let _ = write!(out, "{} {:#x}", name, ops.imm);
        }
    }
    out
}

/// Renders the operand values an instruction works on, for the
/// `instructions` debug format's right-aligned snapshot.
pub fn operand_snapshot(record: &InstrData) -> String {
    let Some(instr) = record.instr else {
        return String::new();
    };
    let mut out = String::new();
    let ops = &record.ops;
    match instr.kind {
        InstrKind::AluImm(_)
        | InstrKind::AluLong(_)
        | InstrKind::AluUnary(_)
        | InstrKind::CmpImm(_)
        | InstrKind::Load { .. }
        | InstrKind::DecoupledLoad { .. } => {
            let _ = write!(out, "r{}={:08x}", ops.s1, record.dr_rs1.val);
        }
        InstrKind::AluReg(_) | InstrKind::AluMul { .. } | InstrKind::CmpReg(_) => {
            let _ = write!(
                out,
                "r{}={:08x} r{}={:08x}",
                ops.s1, record.dr_rs1.val, ops.s2, record.dr_rs2.val
            );
        }
        InstrKind::Store { .. } => {
            let _ = write!(
                out,
                "[{:08x}] r{}={:08x}",
                record.ex_address, ops.s2, record.ex_rs
            );
        }
        InstrKind::StackCtrl(_) => {
            let _ = write!(out, "st={:08x}", record.dr_ss);
        }
        InstrKind::Return => {
            let _ = write!(out, "rb={:08x} ro={:08x}", record.dr_base, record.dr_offset);
        }
        _ => {}
    }
    out
}
