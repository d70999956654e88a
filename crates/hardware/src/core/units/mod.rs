//! Cache units of the core: data, instruction/method, and stack caches.

/// Data cache models (ideal, no-cache, set-associative LRU).
pub mod dcache;
/// Instruction-fetch front ends (method cache, data-cache-backed).
pub mod icache;
/// Method cache with LRU/FIFO replacement.
pub mod mcache;
/// Block-organized stack cache with spill/fill.
pub mod scache;

pub use dcache::DataCache;
pub use icache::InstrCache;
pub use mcache::MethodCache;
pub use scache::StackCache;
