//! Statistics report rendering.
//!
//! The core only maintains counters; this module turns them into the
//! end-of-run report: instruction mix per slot, bubbles, per-stage stall
//! cycles, and the method/data/stack cache and memory sections.

use patmos_core::core::pipeline::{NUM_SLOTS, NUM_STAGES};
use patmos_core::isa;
use patmos_core::sim::Simulator;

/// Prints the full statistics report to stdout.
pub fn print_report(sim: &Simulator, slot_stats: bool) {
    println!("\nCycles: {}", sim.cycle);

    print_instruction_stats(sim, slot_stats);
    print_stall_stats(sim);
    print_method_cache_stats(sim);
    print_data_cache_stats(sim);
    print_stack_cache_stats(sim);
    print_memory_stats(sim);
}

fn print_instruction_stats(sim: &Simulator, slot_stats: bool) {
    let columns = if slot_stats { NUM_SLOTS } else { 1 };

    println!("\nInstruction Statistics:");
    print!("   {:>15}:", "instruction");
    for _ in 0..columns {
        print!(" {:>10} {:>10} {:>10}", "#fetched", "#retired", "#discarded");
    }
    println!();

    let mut total = vec![[0u64; 3]; columns];
    for instr in isa::TABLE {
        let mut rows = vec![[0u64; 3]; columns];
        let mut any = false;
        for slot in 0..NUM_SLOTS {
            let stat = &sim.stats.instrs[slot][instr.id as usize];
            let column = if slot_stats { slot } else { 0 };
            rows[column][0] += stat.fetched;
            rows[column][1] += stat.retired;
            rows[column][2] += stat.discarded;
            any |= stat.fetched != 0 || stat.retired != 0 || stat.discarded != 0;
        }
        if !any {
            continue;
        }
        print!("   {:>15}:", instr.name);
        for row in &rows {
            print!(" {:>10} {:>10} {:>10}", row[0], row[1], row[2]);
        }
        println!();
        for (column, row) in rows.iter().enumerate() {
            for i in 0..3 {
                total[column][i] += row[i];
            }
        }
    }

    print!("   {:>15}:", "all");
    for row in &total {
        print!(" {:>10} {:>10} {:>10}", row[0], row[1], row[2]);
    }
    println!();

    print!("   {:>15}:", "bubbles");
    let mut bubbles = vec![0u64; columns];
    for slot in 0..NUM_SLOTS {
        bubbles[if slot_stats { slot } else { 0 }] += sim.stats.bubbles_retired[slot];
    }
    for b in &bubbles {
        print!(" {:>10} {:>10} {:>10}", "-", b, "-");
    }
    println!();
}

fn print_stall_stats(sim: &Simulator) {
    use patmos_core::core::pipeline::Stage;

    println!("\nStall Cycles:");
    for i in 1..NUM_STAGES {
        println!("   {}: {}", Stage::ALL[i], sim.stats.stall_cycles[i]);
    }
}

fn print_method_cache_stats(sim: &Simulator) {
    let Some(stats) = sim.icache.method_cache().map(|mc| &mc.stats) else {
        return;
    };
    println!("\nMethod Cache Statistics:");
    println!("                            total        max.");
    println!(
        "   Blocks Transferred: {:>10}  {:>10}",
        stats.blocks_transferred, stats.max_blocks_transferred
    );
    println!(
        "   Bytes Transferred : {:>10}  {:>10}",
        stats.bytes_transferred, stats.max_bytes_transferred
    );
    println!("   Cache Hits        : {:>10}", stats.hits);
    println!("   Cache Misses      : {:>10}", stats.misses);
    println!("   Miss Stall Cycles : {:>10}", stats.stall_cycles);

    if !stats.per_method.is_empty() {
        println!("       Method:      #hits     #misses");
        for (address, (hits, misses)) in &stats.per_method {
            println!(
                "   0x{:08x}: {:>10}  {:>10}    {}",
                address,
                hits,
                misses,
                sim.symbols.find(*address)
            );
        }
    }
}

fn print_data_cache_stats(sim: &Simulator) {
    let stats = sim.dcache.stats();
    println!("\nData Cache Statistics:");
    println!(
        "   Read Hits         : {:>10}\n   Read Misses       : {:>10}",
        stats.read_hits, stats.read_misses
    );
    println!(
        "   Write Hits        : {:>10}\n   Write Misses      : {:>10}",
        stats.write_hits, stats.write_misses
    );
    println!(
        "   Bytes Read        : {:>10}\n   Bytes Written     : {:>10}",
        stats.bytes_read, stats.bytes_written
    );
}

fn print_stack_cache_stats(sim: &Simulator) {
    let Some(stats) = sim.scache.stats() else {
        return;
    };
    println!("\nStack Cache Statistics:");
    println!("                           total        max.");
    println!(
        "   Blocks Spilled   : {:>10}  {:>10}",
        stats.blocks_spilled, stats.max_blocks_spilled
    );
    println!(
        "   Blocks Filled    : {:>10}  {:>10}",
        stats.blocks_filled, stats.max_blocks_filled
    );
    println!(
        "   Blocks Allocated : {:>10}  {:>10}",
        stats.blocks_reserved_total, stats.max_blocks_allocated
    );
    println!("   Blocks Reserved  :          -  {:>10}", stats.max_blocks_reserved);
    println!("   Reads            : {:>10}", stats.read_accesses);
    println!("   Bytes Read       : {:>10}", stats.bytes_read);
    println!("   Writes           : {:>10}", stats.write_accesses);
    println!("   Bytes Written    : {:>10}", stats.bytes_written);
    println!("   Emptying Frees   : {:>10}", stats.free_empty);
}

fn print_memory_stats(sim: &Simulator) {
    let Some(stats) = sim.memory.stats() else {
        return;
    };
    let cycles = sim.cycle.max(1) as f64;
    let stall_cycles = stats.busy_cycles.saturating_sub(stats.posted_write_cycles);
    let total_bytes = stats.bytes_read_transferred + stats.bytes_write_transferred;

    println!("\nMain Memory Statistics:");
    println!("                                total  % of cycles");
    println!("   Max Queue Size        : {:>10}", stats.max_queue_size);
    println!("   Consecutive Transfers : {:>10}", stats.consecutive_requests);
    println!("   Requests              : {:>10}", stats.reads + stats.writes);
    println!("   Bytes transferred     : {:>10}", total_bytes);
    println!(
        "   Stall Cycles          : {:>10} {:>10.2}%",
        stall_cycles,
        stall_cycles as f64 / cycles * 100.0
    );
    println!(
        "   Hidden Write Cycles   : {:>10} {:>10.2}%",
        stats.posted_write_cycles,
        stats.posted_write_cycles as f64 / cycles * 100.0
    );

    println!("                                 Read                  Write");
    println!(
        "   Requests              : {:>10}             {:>10}",
        stats.reads, stats.writes
    );
    println!(
        "   Bytes Requested       : {:>10}             {:>10}",
        stats.bytes_read, stats.bytes_written
    );
    println!(
        "   Bytes Transferred     : {:>10}             {:>10}",
        stats.bytes_read_transferred, stats.bytes_write_transferred
    );

    if !stats.requests_per_size.is_empty() {
        println!("Request size    #requests");
        for (size, count) in &stats.requests_per_size {
            println!("  {:>10} : {:>12}", size, count);
        }
    }
}
