//! Intermediate representation for tape programs.
//!
//! A program is a flat `Vec<Instruction>`. Loops are kept structured: every
//! [`Instruction::LoopBegin`] carries the index of its matching
//! [`Instruction::LoopEnd`] and vice versa. The parser establishes that
//! pairing and the optimizer restores it with [`relink_loops`] after every
//! rewrite, so all consumers may rely on it.

pub mod optimizer;
pub mod parser;
pub mod printer;

pub use optimizer::{optimize, optimize_once, relink_loops};
pub use parser::{parse, strip_header_comment};
pub use printer::render;

/// Why an optimized program stops early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaltReason {
    /// An empty loop body was found; it never terminates once entered with
    /// a non-zero cell.
    InfiniteLoop,
}

/// One IR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Add `delta` to the current cell, wrapping at 256.
    Mod(u8),
    /// Add `delta` to the tape index.
    MovePointer(i64),
    Input,
    Output,
    /// Opens a loop; the payload is the index of the matching `LoopEnd`.
    LoopBegin(usize),
    /// Closes a loop; the payload is the index of the matching `LoopBegin`.
    LoopEnd(usize),
    /// Assign the current cell. Only produced by the optimizer.
    SetValue(u8),
    /// Only produced by the optimizer.
    Halt(HaltReason),
}

impl Instruction {
    pub const fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Mod(_) => InstructionKind::Mod,
            Instruction::MovePointer(_) => InstructionKind::MovePointer,
            Instruction::Input => InstructionKind::Input,
            Instruction::Output => InstructionKind::Output,
            Instruction::LoopBegin(_) => InstructionKind::LoopBegin,
            Instruction::LoopEnd(_) => InstructionKind::LoopEnd,
            Instruction::SetValue(_) => InstructionKind::SetValue,
            Instruction::Halt(_) => InstructionKind::Halt,
        }
    }
}

/// Payload-free discriminant of [`Instruction`], used for pattern matching in
/// the optimizer and as the slot index of execution counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstructionKind {
    Mod = 0,
    MovePointer = 1,
    Input = 2,
    Output = 3,
    LoopBegin = 4,
    LoopEnd = 5,
    SetValue = 6,
    Halt = 7,
}

impl InstructionKind {
    pub const COUNT: usize = 8;

    pub const ALL: [InstructionKind; Self::COUNT] = [
        InstructionKind::Mod,
        InstructionKind::MovePointer,
        InstructionKind::Input,
        InstructionKind::Output,
        InstructionKind::LoopBegin,
        InstructionKind::LoopEnd,
        InstructionKind::SetValue,
        InstructionKind::Halt,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            InstructionKind::Mod => "mod",
            InstructionKind::MovePointer => "move_pointer",
            InstructionKind::Input => "input",
            InstructionKind::Output => "output",
            InstructionKind::LoopBegin => "loop_begin",
            InstructionKind::LoopEnd => "loop_end",
            InstructionKind::SetValue => "set_value",
            InstructionKind::Halt => "halt",
        }
    }
}
