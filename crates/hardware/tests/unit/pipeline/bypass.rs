//! Bypass forwarding tests.

use crate::common::builder as b;
use crate::common::harness::{fixed_memory_config, TestContext};
use patmos_core::core::pipeline::Stage;

/// Back-to-back dependent adds in consecutive bundles: the second reads the
/// first's result from the bypass, with no stall for the RAW hazard.
#[test]
fn raw_hazard_forwards_without_stall() {
    let mut ctx = TestContext::new().load_image(&b::prog(&[
        b::addi(4, 0, 3),
        b::addi(5, 0, 4),
        b::add(3, 4, 5),
        b::add(6, 3, 3),
        b::halt(),
    ]));
    ctx.run_to_halt(100);
    assert_eq!(ctx.reg(3), 7);
    assert_eq!(ctx.reg(6), 14, "r3 forwarded from the EX/MW bypass");
    assert_eq!(
        ctx.sim.stats.stall_cycles[Stage::Smw.index()],
        0,
        "no memory stall for a register hazard"
    );
}

/// The two slots of one bundle issue in parallel: slot 1 reads the register
/// values from before the bundle, not slot 0's same-cycle result.
#[test]
fn same_bundle_slots_do_not_forward() {
    let mut ctx = TestContext::new().load_image(&b::prog(&[
        b::addi(3, 0, 5),
        b::dual(b::addi(3, 0, 9)),
        b::add(4, 3, 3), // slot 1: reads the old r3
        b::add(5, 3, 3), // next bundle: reads the new r3
        b::halt(),
    ]));
    ctx.run_to_halt(100);
    assert_eq!(ctx.reg(4), 10, "slot 1 saw r3 == 5");
    assert_eq!(ctx.reg(5), 18, "later bundles see r3 == 9");
}

/// Forwarding stays correct under memory back-pressure: the consumer's EX
/// re-runs while the producer load stalls at MW, and picks the value up the
/// cycle the load completes.
#[test]
fn forwarding_across_mw_stall() {
    let mut ctx = TestContext::with_config(fixed_memory_config(16, 6, 0)).load_image(&b::prog(&[
        b::addi(3, 0, 0x40),
        b::addi(4, 0, 0x2a),
        b::swm(3, 4, 0),
        b::lwm(5, 3, 0),
        b::add(6, 5, 5),
        b::halt(),
    ]));
    ctx.run_to_halt(1000);
    assert_eq!(ctx.reg(5), 0x2a);
    assert_eq!(ctx.reg(6), 0x54, "consumer observed the loaded value");
    assert!(
        ctx.sim.stats.stall_cycles[Stage::Smw.index()] > 0,
        "the load stalled at MW"
    );
}

/// A predicated-off producer does not forward: the consumer reads the
/// architectural register value.
#[test]
fn false_predicate_does_not_forward() {
    let mut ctx = TestContext::new().load_image(&b::prog(&[
        b::addi(3, 0, 1),
        b::cmp_imm(1, 1, 0, 0), // p1 = (r0 != 0) -> false
        b::with_pred(b::addi(3, 0, 77), 1, false), // squashed
        b::add(4, 3, 3),
        b::halt(),
    ]));
    ctx.run_to_halt(100);
    assert_eq!(ctx.reg(3), 1, "squashed write did not commit");
    assert_eq!(ctx.reg(4), 2, "consumer read the old value");
}
