//! The simulator core: one Patmos core and its cycle loop.
//!
//! Each simulated cycle runs, in order:
//! 1. The decoupled-load side channel (`dMW`).
//! 2. The read/compute pass of every stage, backward (MW, EX, DR, IF),
//!    both slots each; then the commit pass in the same order. Compute
//!    passes write only into the instruction's staging fields, so both
//!    slots observe one consistent view of the register files.
//! 3. Retire accounting and stall resolution: the stall level is the
//!    maximum raised during the passes.
//! 4. The pipeline shift: stages above the stall level advance, a bubble
//!    enters behind the stall, and the EX bypasses are cleared when the MW
//!    stage is the one stalling.
//! 5. Fetch and decode of the next bundle when IF is not stalled (or the
//!    injection of a synthesized interrupt dispatch).
//! 6. One tick for the memory and the caches.
//!
//! Exceptions unwind the loop; they are annotated once with the PC and
//! cycle counter and re-raised to the caller.

use crate::common::data::{Uword, Word};
use crate::common::error::{SimException, SimResult};
use crate::common::reg::{PredSel, SPR_S9, SPR_SCH, SPR_SCL};
use crate::config::Config;
use crate::core::arch::{Gpr, Prr, Spr};
use crate::core::pipeline::{InstrData, Pipeline, Stage, NUM_SLOTS};
use crate::core::units::{DataCache, InstrCache, StackCache};
use crate::isa::{interrupt_dispatch, Decoder, InstrKind};
use crate::sim::interrupts::{InterruptSource, NoInterrupts};
use crate::sim::symbols::SymbolMap;
use crate::sim::trace::Tracer;
use crate::soc::MainMemory;
use crate::stats::SimStats;

/// Cycles fetch stays suppressed after an interrupt dispatch is injected.
const INTERRUPT_FETCH_SUPPRESS: u32 = 3;

/// A single simulated Patmos core.
///
/// The simulator owns the register files, the pipeline array, and all cache
/// and memory units; everything is constructed once and mutated in place.
pub struct Simulator {
    /// Cycle counter, exposed through `scl`/`sch`.
    pub cycle: u64,
    /// Main memory.
    pub memory: MainMemory,
    /// Local scratchpad memory.
    pub local: MainMemory,
    /// Data cache over main memory.
    pub dcache: DataCache,
    /// Instruction-fetch front end.
    pub icache: InstrCache,
    /// Stack cache.
    pub scache: StackCache,
    /// Bundle decoder.
    pub decoder: Decoder,
    /// Base address of the currently executing method.
    pub base: Uword,
    /// Program counter.
    pub pc: Uword,
    /// Next program counter.
    pub npc: Uword,
    /// General-purpose registers.
    pub gpr: Gpr,
    /// Predicate registers.
    pub prr: Prr,
    /// Special-purpose registers.
    pub spr: Spr,
    /// Highest stall level raised during the current cycle.
    pub stall: Stage,
    /// In-flight instructions.
    pub pipeline: Pipeline,
    /// The decoupled-load side channel, a mailbox of capacity one.
    pub decoupled_load: Option<InstrData>,
    /// Interrupt source polled at IF.
    pub interrupts: Box<dyn InterruptSource>,
    /// Symbol map used by trace formatting.
    pub symbols: SymbolMap,
    /// Retire and stall statistics.
    pub stats: SimStats,
    /// Stack cache block size, scaling `sres`/`sens`/`sfree` immediates.
    pub stack_block_bytes: Uword,
    fetch_suppress: u32,
    initialized: bool,
}

impl Simulator {
    /// Builds a simulator from its configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            cycle: 0,
            memory: MainMemory::new(&config.memory),
            local: MainMemory::ideal(config.local.size),
            dcache: DataCache::new(&config.dcache),
            icache: InstrCache::new(&config.icache),
            scache: StackCache::new(&config.stack),
            decoder: Decoder::new(),
            base: 0,
            pc: 0,
            npc: 0,
            gpr: Gpr::new(),
            prr: Prr::new(),
            spr: Spr::new(),
            stall: Stage::Sif,
            pipeline: Pipeline::new(),
            decoupled_load: None,
            interrupts: Box::new(NoInterrupts),
            symbols: SymbolMap::new(),
            stats: SimStats::new(),
            stack_block_bytes: config.stack.block_bytes.max(4) as Uword,
            fetch_suppress: 0,
            initialized: false,
        }
    }

    /// Raises a stall up to and including `stage`.
    #[inline]
    pub fn pipeline_stall(&mut self, stage: Stage) {
        self.stall = self.stall.max(stage);
    }

    /// Asks the instruction cache whether the method at `base` can be
    /// dispatched to, starting a load if it is absent.
    pub fn dispatch_available(&mut self, base: Uword) -> SimResult<bool> {
        let Self { icache, memory, .. } = self;
        icache.load_method(memory, base)
    }

    /// Runs the simulation until `max_cycles` elapse or an exception
    /// (including the regular `HALT`) unwinds the loop.
    pub fn run(
        &mut self,
        entry: Uword,
        max_cycles: u64,
        mut tracer: Option<&mut Tracer<'_>>,
    ) -> SimResult<()> {
        if !self.initialized {
            self.base = entry;
            self.pc = entry;
            self.npc = entry;
            let Self { icache, memory, .. } = self;
            icache
                .initialize(memory, entry)
                .map_err(|e| e.annotate(entry, 0))?;
            self.initialized = true;
        }

        for _ in 0..max_cycles {
            let t = tracer.as_mut().map(|t| &mut **t);
            self.step(t).map_err(|e| e.annotate(self.pc, self.cycle))?;
        }
        Ok(())
    }

    /// Simulates one cycle.
    pub fn step(&mut self, mut tracer: Option<&mut Tracer<'_>>) -> SimResult<()> {
        // decoupled-load side channel
        if let Some(mut load) = self.decoupled_load.take() {
            if !load.stage_dmw(self)? {
                self.decoupled_load = Some(load);
            }
        }

        // read/compute passes, backward
        self.invoke(Stage::Smw, InstrData::stage_mw)?;
        self.invoke(Stage::Sex, InstrData::stage_ex)?;
        self.invoke(Stage::Sdr, InstrData::stage_dr)?;
        self.invoke(Stage::Sif, InstrData::stage_if)?;

        // commit passes
        self.invoke(Stage::Smw, InstrData::stage_mw_commit)?;
        self.invoke(Stage::Sex, InstrData::stage_ex_commit)?;
        self.invoke(Stage::Sdr, InstrData::stage_dr_commit)?;
        self.invoke(Stage::Sif, InstrData::stage_if_commit)?;

        // expose the cycle counter through the special registers
        self.spr.write(SPR_SCL, self.cycle as Word);
        self.spr.write(SPR_SCH, (self.cycle >> 32) as Word);

        // retire accounting
        if self.stall != Stage::Smw {
            for slot in 0..NUM_SLOTS {
                let record = self.pipeline.slot(Stage::Smw, slot);
                match record.instr {
                    Some(instr) => {
                        let stat = &mut self.stats.instrs[slot][instr.id as usize];
                        if record.dr_pred {
                            stat.retired += 1;
                        } else {
                            stat.discarded += 1;
                        }
                    }
                    None => self.stats.bubbles_retired[slot] += 1,
                }
            }
        }
        self.stats.stall_cycles[self.stall.index()] += 1;

        if let Some(t) = tracer.as_mut() {
            t.mid_cycle(self);
        }

        // move the pipeline
        self.pipeline.advance(self.stall);
        if self.stall > Stage::Sex {
            self.pipeline.reset_ex_bypasses();
        }

        if self.stall == Stage::Sif {
            self.fetch_and_decode()?;
        } else if self.stall != Stage::Smw {
            self.pipeline.set_bubble(Stage::ALL[self.stall.index() + 1]);
        }

        self.stall = Stage::Sif;

        if let Some(t) = tracer {
            t.end_cycle(self);
        }

        self.cycle = self.cycle.wrapping_add(1);

        // advance the clocked collaborators
        self.memory.tick();
        self.local.tick();
        self.icache.tick();
        self.scache.tick();

        Ok(())
    }

    /// Runs one hook on both slots of a stage.
    ///
    /// The record is taken out of the array for the duration of the hook, so
    /// a slot never forwards from its own bypass.
    fn invoke(
        &mut self,
        stage: Stage,
        hook: fn(&mut InstrData, &mut Simulator) -> SimResult<()>,
    ) -> SimResult<()> {
        for slot in 0..NUM_SLOTS {
            let mut record = self.pipeline.take(stage, slot);
            let result = hook(&mut record, self);
            self.pipeline.put(stage, slot, record);
            result?;
        }
        Ok(())
    }

    /// Refills the IF stage: interrupt injection, fetch suppression, or a
    /// regular fetch-and-decode at the current PC.
    fn fetch_and_decode(&mut self) -> SimResult<()> {
        if self.fetch_suppress > 0 {
            self.fetch_suppress -= 1;
            self.pipeline.set_bubble(Stage::Sif);
            return Ok(());
        }

        if let Some(interrupt) = self.interrupts.pending() {
            if !self.in_branch_shadow() {
                self.spr.write(SPR_S9, self.pc as Word);
                let mut dispatch = InstrData::bubble();
                dispatch.instr = Some(interrupt_dispatch());
                dispatch.pred = PredSel::ALWAYS;
                dispatch.ops.imm = interrupt.handler as i32;
                self.pipeline.put(Stage::Sif, 0, dispatch);
                self.pipeline.put(Stage::Sif, 1, InstrData::bubble());
                self.fetch_suppress = INTERRUPT_FETCH_SUPPRESS;
                self.interrupts.acknowledge();
                return Ok(());
            }
        }

        let pc = self.pc;
        let mut iw = [0 as Uword; NUM_SLOTS];
        let ready = {
            let Self { icache, memory, .. } = self;
            icache.fetch(memory, pc, &mut iw)?
        };
        if !ready {
            // fetch port busy: issue bubbles and retry at the same PC
            self.pipeline.set_bubble(Stage::Sif);
            return Ok(());
        }

        let mut bundle = [InstrData::bubble(); NUM_SLOTS];
        let length = self.decoder.decode(&iw, &mut bundle);
        if length == 0 {
            return Err(SimException::illegal(iw[0]));
        }
        self.npc = self.pc + (length as Uword) * 4;

        for (slot, record) in bundle.into_iter().enumerate() {
            if let Some(instr) = record.instr {
                self.stats.instrs[slot][instr.id as usize].fetched += 1;
            }
            self.pipeline.put(Stage::Sif, slot, record);
        }
        Ok(())
    }

    /// True while a control-flow instruction sits in DR or EX, i.e. the IF
    /// slot is inside a branch shadow and must not take an interrupt.
    fn in_branch_shadow(&self) -> bool {
        [Stage::Sdr, Stage::Sex].iter().any(|&stage| {
            (0..NUM_SLOTS).any(|slot| {
                self.pipeline
                    .slot(stage, slot)
                    .instr
                    .map_or(false, |instr| is_flow_kind(instr.kind))
            })
        })
    }
}

/// True for program-flow instruction kinds.
fn is_flow_kind(kind: InstrKind) -> bool {
    matches!(
        kind,
        InstrKind::CallImm
            | InstrKind::BranchImm
            | InstrKind::BranchCfImm
            | InstrKind::CallReg
            | InstrKind::BranchReg
            | InstrKind::BranchCfReg
            | InstrKind::Return
            | InstrKind::InterruptDispatch
    )
}
