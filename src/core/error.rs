// This module defines the fatal error taxonomy for bfjit using the thiserror crate. Every
// variant is one of four classes: syntax faults raised by the parser (unmatched brackets),
// capacity faults raised when the tape index leaves the tape in either backend, unsupported
// operations (input, or instructions the native backends cannot translate, or a host without
// a native backend) and host toolchain faults (encoder, executable memory, object writer).
// FatalError values are never recovered from inside the crate; callers are required to treat
// them as process-terminating. EncodingError covers the instruction encoders of both ISAs.

//! Error types for bfjit.

use crate::ir::Instruction;
use thiserror::Error;

/// Failure while encoding machine code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("assembler error: {0}")]
    Assembler(String),

    #[error("loop end at instruction {0} has no open loop")]
    UnbalancedLoop(usize),
}

/// Unrecoverable condition. The contract for every caller is to report the
/// diagnostic and terminate.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("program contains a loop ending operator (\"]\") at byte {position} that has no corresponding loop beginning operator (\"[\")")]
    UnmatchedLoopEnd { position: usize },

    #[error("loop beginning operator (\"[\") at byte {position} is never closed")]
    UnclosedLoop { position: usize },

    #[error("trying to access data outside of bounds (index {index}, tape capacity {capacity})")]
    TapeOutOfBounds { index: i64, capacity: usize },

    #[error("invalid tape capacity {capacity}")]
    InvalidTapeCapacity { capacity: usize },

    #[error("input operation reached at instruction {ip} is not implemented")]
    InputUnsupported { ip: usize },

    #[error("instruction {instruction:?} at {ip} cannot be compiled to native code")]
    UnsupportedInstruction { ip: usize, instruction: Instruction },

    #[error("no native backend for this host")]
    UnsupportedHost,

    #[error("code generation failed: {0}")]
    Codegen(#[from] EncodingError),

    #[error("executable memory: {0}")]
    ExecutableMemory(String),

    #[error("object file: {0}")]
    ObjectFile(String),

    #[error("failed to load source: {0}")]
    SourceLoad(String),

    #[error("output failed: {0}")]
    Output(#[from] std::io::Error),
}

/// Result type alias for operations that can hit a fatal condition.
pub type FatalResult<T> = Result<T, FatalError>;
