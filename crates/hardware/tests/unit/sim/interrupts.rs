//! Interrupt injection tests.

use crate::common::builder as b;
use crate::common::harness::{TestContext, ENTRY};
use patmos_core::common::reg::SPR_S9;
use patmos_core::sim::interrupts::QueuedInterrupts;

/// A pending interrupt replaces the next fetch with a synthesized dispatch:
/// `s9` receives the interrupted PC and the handler method executes.
#[test]
fn interrupt_dispatches_to_handler() {
    let main_words = [
        b::nop(),
        b::nop(),
        b::nop(),
        b::nop(),
        b::addi(1, 0, 7), // fallback exit code if no interrupt fires
        b::halt(),
        b::nop(),
        b::nop(),
        b::nop(),
    ];
    let handler_base = ENTRY + main_words.len() as u32 * 4 + 4;
    let handler_words = [
        b::addi(7, 0, 1), // mark the handler
        b::addi(1, 0, 42),
        b::halt(),
        b::nop(),
        b::nop(),
        b::nop(),
    ];

    let mut image = b::ImageBuilder::new();
    image.method(&main_words);
    assert_eq!(image.method(&handler_words), handler_base);

    let mut ctx = TestContext::new().load_image(&image.finish());
    let mut source = QueuedInterrupts::new();
    source.post(handler_base);
    ctx.sim.interrupts = Box::new(source);

    let exit = ctx.run_to_halt(1000);
    assert_eq!(exit, 42, "the handler halted the program");
    assert_eq!(ctx.reg(7), 1, "handler body ran");
    assert_eq!(ctx.spr(SPR_S9) as u32, ENTRY, "s9 holds the interrupted PC");
}

/// Without a pending interrupt the program runs undisturbed.
#[test]
fn no_interrupt_source_is_inert() {
    let mut ctx = TestContext::new().load_image(&b::prog(&[
        b::addi(1, 0, 7),
        b::halt(),
    ]));
    assert_eq!(ctx.run_to_halt(100), 7);
    assert_eq!(ctx.spr(SPR_S9), 0);
}
