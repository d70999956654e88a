//! Test harness: a configured simulator plus program-loading helpers.

#![allow(dead_code)]

use patmos_core::common::data::{Uword, Word};
use patmos_core::common::error::{ExceptionKind, SimException};
use patmos_core::config::Config;
use patmos_core::sim::{loader, Simulator};

/// Default entry point of images built by the test builder.
pub const ENTRY: Uword = 4;

/// A simulator under test.
pub struct TestContext {
    pub sim: Simulator,
    entry: Uword,
}

impl TestContext {
    /// A context with ideal memory and caches, sized down for tests.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// A context with an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self { sim: Simulator::new(&config), entry: ENTRY }
    }

    /// Loads an image at address 0.
    pub fn load_image(mut self, image: &[u8]) -> Self {
        loader::load_image(&mut self.sim.memory, image, 0).expect("image fits in memory");
        self
    }

    /// Runs for at most `cycles`, propagating exceptions.
    pub fn run(&mut self, cycles: u64) -> Result<(), SimException> {
        self.sim.run(self.entry, cycles, None)
    }

    /// Runs until the program halts, returning its exit code.
    ///
    /// Panics when the cycle budget runs out or another exception surfaces.
    pub fn run_to_halt(&mut self, max_cycles: u64) -> Word {
        match self.sim.run(self.entry, max_cycles, None) {
            Err(SimException { kind: ExceptionKind::Halt(code), .. }) => code,
            Err(other) => panic!("unexpected exception: {}", other),
            Ok(()) => panic!("program did not halt within {} cycles", max_cycles),
        }
    }

    /// Runs and returns the exception that ended the run.
    pub fn run_to_exception(&mut self, max_cycles: u64) -> SimException {
        self.sim
            .run(self.entry, max_cycles, None)
            .expect_err("expected an exception")
    }

    /// Reads a general register.
    pub fn reg(&self, idx: usize) -> Word {
        self.sim.gpr.read(idx)
    }

    /// Reads a special register.
    pub fn spr(&self, idx: usize) -> Word {
        self.sim.spr.read(idx)
    }

    /// Reads a word from main memory without timing.
    pub fn peek_word(&mut self, address: Uword) -> u32 {
        let mut buf = [0u8; 4];
        self.sim
            .memory
            .read_peek(address, &mut buf)
            .expect("address mapped");
        u32::from_be_bytes(buf)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The default test configuration: 64 KiB of ideal memory, ideal caches.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.memory.size = 0x1_0000;
    config
}

/// A configuration with fixed-delay main memory.
pub fn fixed_memory_config(burst_bytes: u32, burst_ticks: u32, read_delay: u32) -> Config {
    let mut config = test_config();
    config.memory.kind = patmos_core::config::MemoryKind::Fixed;
    config.memory.burst_bytes = burst_bytes;
    config.memory.burst_ticks = burst_ticks;
    config.memory.read_delay_ticks = read_delay;
    config
}
