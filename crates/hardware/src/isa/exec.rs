//! Per-stage instruction semantics.
//!
//! Every pipeline hook is implemented here as a method on the in-flight
//! record, dispatching on the instruction kind. The dual-phase pattern per
//! stage: the read/compute hook reads global state and writes only into the
//! record's staging fields; the commit hook flushes staged results into
//! global state. Bubbles do nothing in every hook.
//!
//! Register reads at EX go through the bypass chain: the other EX slot
//! first, then the two MW slots, then the register file.

use crate::common::data::{Uword, Width, Word};
use crate::common::error::{SimException, SimResult};
use crate::common::reg::{GPR_EXIT_CODE, GPR_RFB, GPR_RFO, SPR_SH, SPR_SL, SPR_SM, SPR_ST};
use crate::core::arch::GprOp;
use crate::core::pipeline::{InstrData, Stage};
use crate::isa::{multiply, InstrKind, MemTarget, StackOp};
use crate::sim::simulator::Simulator;

/// Reads a general register at EX, considering the bypasses of the other EX
/// slot and both MW slots before the value captured at DR.
fn read_gpr_ex(s: &Simulator, op: GprOp) -> Word {
    let p = &s.pipeline;
    let mut value = op.val;
    value = p.slot(Stage::Smw, 1).gpr_mw.forward(op.idx, value);
    value = p.slot(Stage::Smw, 0).gpr_mw.forward(op.idx, value);
    value = p.slot(Stage::Sex, 1).gpr_ex.forward(op.idx, value);
    value = p.slot(Stage::Sex, 0).gpr_ex.forward(op.idx, value);
    value
}

/// True for kinds whose result goes through the EX/MW bypass chain.
fn writes_gpr_via_bypass(kind: InstrKind) -> bool {
    matches!(
        kind,
        InstrKind::AluImm(_)
            | InstrKind::AluLong(_)
            | InstrKind::AluReg(_)
            | InstrKind::AluUnary(_)
            | InstrKind::MoveFromSpecial
    )
}

impl InstrData {
    /// IF hook: advance the PC, capturing the issue-time PC for
    /// PC-relative control flow.
    pub fn stage_if(&mut self, s: &mut Simulator) -> SimResult<()> {
        let Some(instr) = self.instr else {
            return Ok(());
        };
        if matches!(
            instr.kind,
            InstrKind::CallImm
                | InstrKind::BranchImm
                | InstrKind::BranchCfImm
                | InstrKind::CallReg
                | InstrKind::BranchReg
                | InstrKind::BranchCfReg
                | InstrKind::Return
                | InstrKind::InterruptDispatch
        ) && s.pc != s.npc
        {
            // by the time EX runs the PC has moved on; branch targets are
            // relative to the PC captured here
            self.if_pc = s.pc;
        }
        s.pc = s.npc;
        Ok(())
    }

    /// IF commit hook.
    pub fn stage_if_commit(&mut self, _s: &mut Simulator) -> SimResult<()> {
        Ok(())
    }

    /// DR hook: read the predicate and the register operands into the
    /// staging latches.
    pub fn stage_dr(&mut self, s: &mut Simulator) -> SimResult<()> {
        let Some(instr) = self.instr else {
            return Ok(());
        };
        self.dr_pred = s.prr.read(self.pred);

        match instr.kind {
            InstrKind::AluImm(_) | InstrKind::AluLong(_) | InstrKind::AluUnary(_) => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
            }
            InstrKind::AluReg(_) | InstrKind::AluMul { .. } | InstrKind::CmpReg(_) => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
                self.dr_rs2 = GprOp::read(&s.gpr, self.ops.s2 as usize);
            }
            InstrKind::CmpImm(_) => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
            }
            InstrKind::PredCombine(_) => {
                self.dr_ps1 = s.prr.read(crate::common::reg::PredSel(self.ops.s1));
                self.dr_ps2 = s.prr.read(crate::common::reg::PredSel(self.ops.s2));
            }
            InstrKind::WaitMem => {
                if self.dr_pred && s.decoupled_load.is_some() {
                    s.pipeline_stall(Stage::Sdr);
                }
            }
            InstrKind::MoveToSpecial => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
            }
            InstrKind::MoveFromSpecial => {
                // s0 reads the packed predicate registers
                self.dr_ss = if self.ops.s1 == 0 {
                    s.prr.mask() as Word
                } else {
                    s.spr.read(self.ops.s1 as usize)
                };
            }
            InstrKind::Load { .. } => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
            }
            InstrKind::DecoupledLoad { .. } => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
                if self.dr_pred && s.decoupled_load.is_some() {
                    // the side channel holds at most one load
                    s.pipeline_stall(Stage::Sdr);
                }
            }
            InstrKind::Store { .. } => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
                self.dr_rs2 = GprOp::read(&s.gpr, self.ops.s2 as usize);
            }
            InstrKind::StackCtrl(_) => {
                self.dr_ss = s.spr.read(SPR_ST);
            }
            InstrKind::CallImm | InstrKind::BranchImm | InstrKind::BranchCfImm => {
                self.ex_pfl_discard = false;
            }
            InstrKind::CallReg | InstrKind::BranchReg | InstrKind::BranchCfReg => {
                self.dr_rs1 = GprOp::read(&s.gpr, self.ops.s1 as usize);
                self.ex_pfl_discard = false;
            }
            InstrKind::Return => {
                self.dr_base = s.gpr.read(self.ops.s1 as usize);
                self.dr_offset = s.gpr.read(self.ops.s2 as usize);
                self.ex_pfl_discard = false;
            }
            InstrKind::InterruptDispatch => {
                self.ex_pfl_discard = false;
            }
        }
        Ok(())
    }

    /// DR commit hook.
    pub fn stage_dr_commit(&mut self, _s: &mut Simulator) -> SimResult<()> {
        Ok(())
    }

    /// EX hook: compute results, addresses, predicates, and control flow.
    pub fn stage_ex(&mut self, s: &mut Simulator) -> SimResult<()> {
        let Some(instr) = self.instr else {
            return Ok(());
        };
        match instr.kind {
            InstrKind::AluImm(op) | InstrKind::AluLong(op) => {
                self.ex_result = op.apply(read_gpr_ex(s, self.dr_rs1), self.ops.imm);
            }
            InstrKind::AluReg(op) => {
                self.ex_result =
                    op.apply(read_gpr_ex(s, self.dr_rs1), read_gpr_ex(s, self.dr_rs2));
            }
            InstrKind::AluUnary(op) => {
                self.ex_result = op.apply(read_gpr_ex(s, self.dr_rs1));
            }
            InstrKind::AluMul { signed } => {
                let (low, high) = multiply(
                    signed,
                    read_gpr_ex(s, self.dr_rs1),
                    read_gpr_ex(s, self.dr_rs2),
                );
                self.ex_mull = low;
                self.ex_mulh = high;
            }
            InstrKind::CmpReg(op) => {
                if self.dr_pred {
                    let result =
                        op.apply(read_gpr_ex(s, self.dr_rs1), read_gpr_ex(s, self.dr_rs2));
                    s.prr.write((self.ops.d & 0x7) as usize, result);
                }
            }
            InstrKind::CmpImm(op) => {
                if self.dr_pred {
                    let result = op.apply(read_gpr_ex(s, self.dr_rs1), self.ops.imm);
                    s.prr.write((self.ops.d & 0x7) as usize, result);
                }
            }
            InstrKind::PredCombine(f) => {
                if self.dr_pred {
                    s.prr
                        .write((self.ops.d & 0x7) as usize, f.apply(self.dr_ps1, self.dr_ps2));
                }
            }
            InstrKind::MoveToSpecial => {
                if self.dr_pred {
                    let value = read_gpr_ex(s, self.dr_rs1);
                    if self.ops.d == 0 {
                        // p0 is always true and stays untouched
                        s.prr.set_mask(value as u32);
                    } else {
                        s.spr.write(self.ops.d as usize, value);
                    }
                }
            }
            InstrKind::MoveFromSpecial => {
                // special registers are read at DR, without forwarding
                self.ex_result = self.dr_ss;
            }
            InstrKind::Load { width, .. } => {
                self.ex_address = effective_address(read_gpr_ex(s, self.dr_rs1), self.ops.imm, width);
            }
            InstrKind::DecoupledLoad { width, .. } => {
                self.ex_address = effective_address(read_gpr_ex(s, self.dr_rs1), self.ops.imm, width);
                if self.dr_pred {
                    debug_assert!(s.decoupled_load.is_none());
                    s.decoupled_load = Some(*self);
                }
            }
            InstrKind::Store { width, .. } => {
                self.ex_address = effective_address(read_gpr_ex(s, self.dr_rs1), self.ops.imm, width);
                self.ex_rs = read_gpr_ex(s, self.dr_rs2);
            }
            InstrKind::StackCtrl(_) => {}
            InstrKind::WaitMem => {}
            InstrKind::CallImm => {
                let target = self.ops.imm.wrapping_mul(4) as Uword;
                self.ex_address = target;
                self.store_return_address(s);
                self.fetch_and_dispatch(s, target, target)?;
            }
            InstrKind::BranchImm => {
                let target = self.if_pc.wrapping_add(self.ops.imm.wrapping_mul(4) as Uword);
                self.ex_address = target;
                self.dispatch(s, s.base, target);
            }
            InstrKind::BranchCfImm => {
                let target = self.ops.imm.wrapping_mul(4) as Uword;
                self.ex_address = target;
                self.fetch_and_dispatch(s, target, target)?;
            }
            InstrKind::CallReg => {
                let target = read_gpr_ex(s, self.dr_rs1) as Uword;
                self.ex_address = target;
                self.store_return_address(s);
                self.fetch_and_dispatch(s, target, target)?;
            }
            InstrKind::BranchReg => {
                let target = self.if_pc.wrapping_add(read_gpr_ex(s, self.dr_rs1) as Uword);
                self.ex_address = target;
                self.dispatch(s, s.base, target);
            }
            InstrKind::BranchCfReg => {
                let target = read_gpr_ex(s, self.dr_rs1) as Uword;
                self.ex_address = target;
                self.fetch_and_dispatch(s, target, target)?;
            }
            InstrKind::Return => {
                if self.dr_pred && self.dr_base == 0 {
                    // returning to base 0 halts; freeze the front end until
                    // the halt surfaces at MW commit
                    s.pipeline_stall(Stage::Sdr);
                } else {
                    let base = self.dr_base as Uword;
                    let target = self.dr_base.wrapping_add(self.dr_offset) as Uword;
                    self.ex_address = target;
                    self.fetch_and_dispatch(s, base, target)?;
                }
            }
            InstrKind::InterruptDispatch => {
                let handler = self.ops.imm as Uword;
                self.ex_address = handler;
                self.fetch_and_dispatch(s, handler, handler)?;
            }
        }
        Ok(())
    }

    /// EX commit hook: deposit results into the EX bypass.
    pub fn stage_ex_commit(&mut self, _s: &mut Simulator) -> SimResult<()> {
        let Some(instr) = self.instr else {
            return Ok(());
        };
        if writes_gpr_via_bypass(instr.kind) && self.dr_pred {
            self.gpr_ex.set(self.ops.d, self.ex_result);
        }
        Ok(())
    }

    /// MW hook: memory accesses and register file writes.
    pub fn stage_mw(&mut self, s: &mut Simulator) -> SimResult<()> {
        let Some(instr) = self.instr else {
            return Ok(());
        };
        match instr.kind {
            kind if writes_gpr_via_bypass(kind) => {
                if self.dr_pred {
                    if let Some((idx, value)) = self.gpr_ex.get() {
                        s.gpr.write(idx as usize, value);
                        self.gpr_mw.set(idx, value);
                    }
                    self.gpr_ex.reset();
                }
            }
            InstrKind::AluMul { .. } => {
                if self.dr_pred {
                    s.spr.write(SPR_SL, self.ex_mull);
                    s.spr.write(SPR_SH, self.ex_mulh);
                }
            }
            InstrKind::Load { target, width, signed } => {
                if self.dr_pred {
                    match load_value(s, target, width, signed, self.ex_address)? {
                        Some(value) => {
                            s.gpr.write(self.ops.d as usize, value);
                            self.gpr_mw.set(self.ops.d, value);
                        }
                        None => s.pipeline_stall(Stage::Smw),
                    }
                }
            }
            InstrKind::Store { target, width } => {
                if self.dr_pred
                    && !store_value(s, target, width, self.ex_address, self.ex_rs)?
                {
                    s.pipeline_stall(Stage::Smw);
                }
            }
            InstrKind::StackCtrl(op) => {
                let mut stack_top = self.dr_ss as Uword;
                if self.dr_pred {
                    let bytes = (self.ops.imm as Uword).wrapping_mul(s.stack_block_bytes);
                    let done = {
                        let Simulator { scache, memory, .. } = s;
                        match op {
                            StackOp::Reserve => scache.reserve(memory, bytes, &mut stack_top)?,
                            StackOp::Ensure => scache.ensure(memory, bytes, &mut stack_top)?,
                            StackOp::Free => scache.free(bytes, &mut stack_top)?,
                        }
                    };
                    if !done {
                        s.pipeline_stall(Stage::Smw);
                    }
                }
                s.spr.write(SPR_ST, stack_top as Word);
            }
            _ => {}
        }
        Ok(())
    }

    /// MW commit hook: clean up the MW bypass; surface halts.
    pub fn stage_mw_commit(&mut self, s: &mut Simulator) -> SimResult<()> {
        let Some(instr) = self.instr else {
            return Ok(());
        };
        match instr.kind {
            kind if writes_gpr_via_bypass(kind) => {
                if self.dr_pred {
                    self.gpr_mw.reset();
                }
            }
            InstrKind::Load { .. } => {
                if self.dr_pred {
                    self.gpr_mw.reset();
                }
            }
            InstrKind::Return => {
                if self.dr_pred && self.dr_base == 0 {
                    return Err(SimException::halt(s.gpr.read(GPR_EXIT_CODE)));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Decoupled-load hook, run once per cycle on the side channel.
    ///
    /// Returns `true` when the load completed and wrote `sm`.
    pub fn stage_dmw(&mut self, s: &mut Simulator) -> SimResult<bool> {
        let Some(instr) = self.instr else {
            return Ok(true);
        };
        if let InstrKind::DecoupledLoad { target, width, signed } = instr.kind {
            match load_value(s, target, width, signed, self.ex_address)? {
                Some(value) => {
                    s.spr.write(SPR_SM, value);
                    Ok(true)
                }
                None => Ok(false),
            }
        } else {
            Ok(true)
        }
    }

    /// Writes the return base and offset, unless predicated off or already
    /// dispatched.
    fn store_return_address(&mut self, s: &mut Simulator) {
        if self.dr_pred && !self.ex_pfl_discard {
            debug_assert!(s.base <= s.npc);
            s.gpr.write(GPR_RFB, s.base as Word);
            s.gpr.write(GPR_RFO, s.npc.wrapping_sub(s.base) as Word);
        }
    }

    /// Dispatches to a method that may still have to be loaded; stalls EX
    /// until the method cache reports it available.
    fn fetch_and_dispatch(&mut self, s: &mut Simulator, base: Uword, target: Uword) -> SimResult<()> {
        if self.dr_pred && !self.ex_pfl_discard {
            if s.dispatch_available(base)? {
                s.base = base;
                s.pc = target;
                s.npc = target;
                self.ex_pfl_discard = true;
            } else {
                s.pipeline_stall(Stage::Sex);
            }
        }
        Ok(())
    }

    /// Dispatches within a method that is already resident.
    fn dispatch(&mut self, s: &mut Simulator, base: Uword, target: Uword) {
        if self.dr_pred && !self.ex_pfl_discard {
            debug_assert!(s.icache.is_available(base));
            s.base = base;
            s.pc = target;
            s.npc = target;
            self.ex_pfl_discard = true;
        }
    }
}

/// Computes a load/store address: base register plus scaled immediate.
fn effective_address(base: Word, imm: i32, width: Width) -> Uword {
    base.wrapping_add(imm.wrapping_mul(width.size() as i32)) as Uword
}

/// Attempts a typed read from the selected memory.
///
/// `Ok(None)` means the memory is not ready and MW must stall.
fn load_value(
    s: &mut Simulator,
    target: MemTarget,
    width: Width,
    signed: bool,
    address: Uword,
) -> SimResult<Option<Word>> {
    if address & (width.size() - 1) != 0 {
        return Err(SimException::unaligned(address));
    }
    let mut buf = [0u8; 4];
    let n = width.size() as usize;
    let ready = {
        let Simulator { scache, dcache, memory, local, .. } = s;
        match target {
            MemTarget::Stack => scache.read(address, &mut buf[..n])?,
            MemTarget::Local => local.read(address, &mut buf[..n], false)?,
            MemTarget::Data => dcache.read(memory, address, &mut buf[..n])?,
            MemTarget::Main => memory.read(address, &mut buf[..n], false)?,
        }
    };
    Ok(if ready {
        Some(width.extend(&buf, signed))
    } else {
        None
    })
}

/// Attempts a typed write to the selected memory.
///
/// `false` means the memory has not accepted the data yet and MW must stall.
fn store_value(
    s: &mut Simulator,
    target: MemTarget,
    width: Width,
    address: Uword,
    value: Word,
) -> SimResult<bool> {
    if address & (width.size() - 1) != 0 {
        return Err(SimException::unaligned(address));
    }
    let mut buf = [0u8; 4];
    let n = width.size() as usize;
    width.store(value, &mut buf);
    let Simulator { scache, dcache, memory, local, .. } = s;
    match target {
        MemTarget::Stack => scache.write(address, &buf[..n]),
        MemTarget::Local => local.write(address, &buf[..n]),
        MemTarget::Data => dcache.write(memory, address, &buf[..n]),
        MemTarget::Main => memory.write(address, &buf[..n]),
    }
}
