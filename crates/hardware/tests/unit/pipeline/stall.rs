//! Stall behavior tests.

use crate::common::builder as b;
use crate::common::harness::{fixed_memory_config, TestContext};
use patmos_core::core::pipeline::Stage;

/// A load over slow memory raises MW-level stalls; the same program over
/// ideal memory raises none.
#[test]
fn load_stalls_at_mw_on_slow_memory() {
    let program = b::prog(&[
        b::addi(3, 0, 0x100),
        b::lwm(4, 3, 0),
        b::halt(),
    ]);

    let mut ideal = TestContext::new().load_image(&program);
    ideal.run_to_halt(100);
    assert_eq!(ideal.sim.stats.stall_cycles[Stage::Smw.index()], 0);

    let mut slow = TestContext::with_config(fixed_memory_config(16, 8, 2)).load_image(&program);
    slow.run_to_halt(1000);
    assert_eq!(
        slow.sim.stats.stall_cycles[Stage::Smw.index()],
        10,
        "one burst plus read delay of MW stalls"
    );
}

/// Posted writes hide the store latency: the store does not stall MW, and
/// the memory counts the drain cycles as hidden.
#[test]
fn posted_writes_hide_store_latency() {
    let program = b::prog(&[
        b::addi(3, 0, 0x100),
        b::addi(4, 0, 7),
        b::swm(3, 4, 0),
        b::halt(),
    ]);

    let mut unposted = TestContext::with_config(fixed_memory_config(16, 8, 0)).load_image(&program);
    unposted.run_to_halt(1000);
    assert!(unposted.sim.stats.stall_cycles[Stage::Smw.index()] > 0);

    let mut config = fixed_memory_config(16, 8, 0);
    config.memory.posted_writes = 2;
    let mut posted = TestContext::with_config(config).load_image(&program);
    posted.run_to_halt(1000);
    assert_eq!(
        posted.sim.stats.stall_cycles[Stage::Smw.index()],
        0,
        "posted store accepted without stalling"
    );
    assert!(posted.sim.memory.stats().unwrap().posted_write_cycles > 0);
}

/// `waitm` stalls at DR only while a decoupled load is outstanding.
#[test]
fn waitm_without_outstanding_load_is_free() {
    let mut ctx = TestContext::new().load_image(&b::prog(&[
        b::waitm(),
        b::addi(3, 0, 1),
        b::halt(),
    ]));
    ctx.run_to_halt(100);
    assert_eq!(ctx.reg(3), 1);
}

/// While the whole pipeline is frozen on MW, nothing retires.
#[test]
fn frozen_pipeline_retires_nothing() {
    let program = b::prog(&[
        b::addi(3, 0, 0x100),
        b::lwm(4, 3, 0),
        b::halt(),
    ]);
    let mut ctx = TestContext::with_config(fixed_memory_config(16, 8, 2)).load_image(&program);
    ctx.run_to_halt(1000);

    let retired: u64 = ctx.sim.stats.instrs[0]
        .iter()
        .map(|s| s.retired + s.discarded)
        .sum::<u64>()
        + ctx.sim.stats.bubbles_retired[0];
    let unstalled: u64 = ctx.sim.stats.stall_cycles[Stage::Sif.index()]
        + ctx.sim.stats.stall_cycles[Stage::Sdr.index()]
        + ctx.sim.stats.stall_cycles[Stage::Sex.index()];
    assert_eq!(
        retired, unstalled,
        "slot 0 retires exactly one record per non-frozen cycle"
    );
}
