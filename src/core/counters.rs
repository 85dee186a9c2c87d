//! Per-instruction-kind execution counters.
//!
//! The layout is shared with generated code: slot `k` is the `u64` at byte
//! offset `8 * k` and counts executions of [`InstructionKind`] `k`.

use crate::ir::InstructionKind;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct InstructionCounters {
    counts: [u64; InstructionKind::COUNT],
}

impl InstructionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of `kind`'s slot inside the block.
    pub const fn slot_offset(kind: InstructionKind) -> i32 {
        (kind.index() * std::mem::size_of::<u64>()) as i32
    }

    pub fn record(&mut self, kind: InstructionKind) {
        self.counts[kind.index()] += 1;
    }

    pub fn get(&self, kind: InstructionKind) -> u64 {
        self.counts[kind.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u64 {
        self.counts.as_mut_ptr()
    }
}

impl fmt::Display for InstructionCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Executed instructions: {}", self.total())?;
        for kind in InstructionKind::ALL {
            let count = self.get(kind);
            if count > 0 {
                writeln!(f, "  {}: {}", kind.name(), count)?;
            }
        }
        Ok(())
    }
}
