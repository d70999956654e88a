//! Debug trace output.
//!
//! Formats, written to a caller-provided sink and gated by a starting cycle:
//! `trace` prints one line of PC and cycle per cycle; `instructions`
//! disassembles the EX stage with a right-aligned operand snapshot;
//! `blocks` prints a line each time the PC enters a known symbol; `calls`
//! prints one line per call/return edge with the argument or result
//! registers; `short`, `default`, `long`, and `all` dump register files and
//! (for `all`) the cache and memory state.

use std::io::Write;
use std::str::FromStr;

use crate::common::reg::{GPR_FIRST_ARG, GPR_LAST_ARG};
use crate::core::pipeline::{Stage, NUM_SLOTS};
use crate::isa::disasm::{disasm, operand_snapshot};
use crate::isa::InstrKind;
use crate::sim::simulator::Simulator;

/// Debug output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugFmt {
    /// One line of general registers per cycle.
    Short,
    /// PC and cycle per cycle.
    Trace,
    /// Disassembly of the EX stage with operand values.
    Instructions,
    /// A line whenever the PC enters a known symbol.
    Blocks,
    /// A line per call/return edge with arguments or return values.
    Calls,
    /// Register dump per cycle.
    Default,
    /// Register dump per cycle (alias kept for option compatibility).
    Long,
    /// Register dump plus cache and memory state per cycle.
    All,
}

impl FromStr for DebugFmt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(DebugFmt::Short),
            "trace" => Ok(DebugFmt::Trace),
            "instructions" | "instr" => Ok(DebugFmt::Instructions),
            "blocks" => Ok(DebugFmt::Blocks),
            "calls" => Ok(DebugFmt::Calls),
            "default" => Ok(DebugFmt::Default),
            "long" => Ok(DebugFmt::Long),
            "all" => Ok(DebugFmt::All),
            other => Err(format!("unknown debug format: {}", other)),
        }
    }
}

/// Writes debug output for the selected format.
pub struct Tracer<'a> {
    out: &'a mut dyn Write,
    fmt: DebugFmt,
    start_cycle: u64,
}

impl<'a> Tracer<'a> {
    /// Creates a tracer writing to `out` from `start_cycle` onward.
    pub fn new(out: &'a mut dyn Write, fmt: DebugFmt, start_cycle: u64) -> Self {
        Self { out, fmt, start_cycle }
    }

    fn enabled(&self, s: &Simulator) -> bool {
        s.cycle >= self.start_cycle
    }

    /// Mid-cycle hook: runs after the commit passes, before the pipeline
    /// shifts, so the stage contents of this cycle are still visible.
    pub fn mid_cycle(&mut self, s: &Simulator) {
        if !self.enabled(s) {
            return;
        }
        match self.fmt {
            DebugFmt::Instructions => self.print_instructions(s),
            DebugFmt::Calls => self.print_calls(s),
            _ => {}
        }
    }

    /// End-of-cycle hook: runs after fetch, with the next PC in place.
    pub fn end_cycle(&mut self, s: &Simulator) {
        if !self.enabled(s) {
            return;
        }
        match self.fmt {
            DebugFmt::Trace => {
                let _ = writeln!(self.out, "{:08x} {}", s.pc, s.cycle);
            }
            DebugFmt::Blocks => {
                if s.symbols.contains(s.pc) {
                    let _ = writeln!(
                        self.out,
                        "{:08x} {:9} {}",
                        s.pc,
                        s.cycle,
                        s.symbols.find(s.pc)
                    );
                }
            }
            DebugFmt::Short => {
                let _ = s.gpr.dump(self.out);
                let _ = writeln!(self.out);
            }
            DebugFmt::Default | DebugFmt::Long | DebugFmt::All => {
                self.print_registers(s);
                if self.fmt == DebugFmt::All {
                    let _ = writeln!(self.out, "Method Cache:");
                    let _ = s.icache.dump(self.out);
                    let _ = writeln!(self.out, "Data Cache:");
                    let _ = s.dcache.dump(self.out);
                    let _ = writeln!(self.out, "Stack Cache:");
                    let _ = s.scache.dump(self.out);
                    let _ = writeln!(self.out, "Memory:");
                    let _ = s.memory.dump(self.out);
                    let _ = writeln!(self.out);
                }
            }
            _ => {}
        }
    }

    fn print_instructions(&mut self, s: &Simulator) {
        let mut line = String::new();
        for slot in 0..NUM_SLOTS {
            if slot != 0 {
                line.push_str(" || ");
            }
            line.push_str(&disasm(s.pipeline.slot(Stage::Sex, slot), &s.symbols));
        }
        let _ = write!(self.out, "{:08x} {:9} {:<56}", s.pc, s.cycle, line);
        for slot in 0..NUM_SLOTS {
            let snapshot = operand_snapshot(s.pipeline.slot(Stage::Sex, slot));
            if !snapshot.is_empty() {
                let _ = write!(self.out, " {}", snapshot);
            }
        }
        let _ = writeln!(self.out);
    }

    fn print_calls(&mut self, s: &Simulator) {
        if s.stall == Stage::Smw {
            return;
        }
        for slot in 0..NUM_SLOTS {
            let record = s.pipeline.slot(Stage::Smw, slot);
            let Some(instr) = record.instr else { continue };
            if !record.dr_pred {
                continue;
            }
            match instr.kind {
                InstrKind::CallImm | InstrKind::CallReg => {
                    let _ = write!(
                        self.out,
                        "{:9}: call {:08x} {} args:",
                        s.cycle,
                        record.ex_address,
                        s.symbols.find(record.ex_address)
                    );
                    for r in GPR_FIRST_ARG..=GPR_LAST_ARG {
                        let _ = write!(self.out, " r{}={:08x}", r, s.gpr.read(r));
                    }
                    let _ = writeln!(self.out);
                }
                InstrKind::Return => {
                    let _ = writeln!(
                        self.out,
                        "{:9}: ret  {:08x} {} r1={:08x} r2={:08x}",
                        s.cycle,
                        record.ex_address,
                        s.symbols.find(record.ex_address),
                        s.gpr.read(1),
                        s.gpr.read(2)
                    );
                }
                _ => {}
            }
        }
    }

    fn print_registers(&mut self, s: &Simulator) {
        let _ = writeln!(self.out, "\nCyc : {}", s.cycle);
        let mask = s.prr.mask();
        let _ = write!(self.out, " PRR: ");
        for p in (0..8).rev() {
            let _ = write!(self.out, "{}", (mask >> p) & 1);
        }
        let _ = writeln!(
            self.out,
            "  BASE: {:08x}   PC : {:08x}   {}",
            s.base,
            s.pc,
            s.symbols.find(s.pc)
        );
        let _ = write!(self.out, " ");
        let _ = s.gpr.dump(self.out);
        let _ = writeln!(self.out);
        let _ = s.spr.dump(self.out, mask);
    }
}
