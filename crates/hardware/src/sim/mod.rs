//! Simulation driver: the cycle loop, loader, symbols, interrupts, trace.

/// Interrupt sources polled at IF.
pub mod interrupts;
/// Binary image loading.
pub mod loader;
/// The simulator core and cycle loop.
pub mod simulator;
/// Address-to-symbol mapping.
pub mod symbols;
/// Debug trace output.
pub mod trace;

pub use simulator::Simulator;
pub use symbols::SymbolMap;
pub use trace::{DebugFmt, Tracer};
