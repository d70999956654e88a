//! Interrupt sources.
//!
//! The core polls an interrupt source at IF. When an interrupt is pending
//! and the fetch slot is not inside a branch shadow, the core writes the
//! return PC to `s9`, injects a synthesized dispatch bundle targeting the
//! handler, and suppresses fetching for three cycles while the synthesized
//! flow completes.

use std::collections::VecDeque;

use crate::common::data::Uword;

/// A pending interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interrupt {
    /// Address of the handler method.
    pub handler: Uword,
}

/// Source of external interrupts, polled once per fetch opportunity.
pub trait InterruptSource {
    /// The currently pending interrupt, if any.
    fn pending(&self) -> Option<Interrupt>;

    /// Called when the pending interrupt has been accepted.
    fn acknowledge(&mut self);
}

/// An interrupt source that never fires.
pub struct NoInterrupts;

impl InterruptSource for NoInterrupts {
    fn pending(&self) -> Option<Interrupt> {
        None
    }

    fn acknowledge(&mut self) {}
}

/// A programmable interrupt source delivering queued interrupts in order.
#[derive(Default)]
pub struct QueuedInterrupts {
    queue: VecDeque<Interrupt>,
}

impl QueuedInterrupts {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an interrupt targeting `handler`.
    pub fn post(&mut self, handler: Uword) {
        self.queue.push_back(Interrupt { handler });
    }
}

impl InterruptSource for QueuedInterrupts {
    fn pending(&self) -> Option<Interrupt> {
        self.queue.front().copied()
    }

    fn acknowledge(&mut self) {
        self.queue.pop_front();
    }
}
