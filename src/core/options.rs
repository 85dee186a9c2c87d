//! Engine configuration.

use super::error::FatalResult;
use super::tape::{Tape, DEFAULT_TAPE_CAPACITY};

/// Options shared by the interpreter and the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Tape size in cells.
    pub tape_capacity: usize,
    /// Count executed instructions per kind.
    pub debug_counters: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tape_capacity: DEFAULT_TAPE_CAPACITY,
            debug_counters: false,
        }
    }
}

impl EngineOptions {
    pub fn with_tape_capacity(mut self, tape_capacity: usize) -> Self {
        self.tape_capacity = tape_capacity;
        self
    }

    pub fn with_debug_counters(mut self, debug_counters: bool) -> Self {
        self.debug_counters = debug_counters;
        self
    }

    /// Allocate a zeroed tape of the configured capacity.
    pub fn new_tape(&self) -> FatalResult<Tape> {
        Tape::new(self.tape_capacity)
    }
}
