// This module is the seam between the IR and the per-ISA native backends. CodeGenerator is the
// trait both backends implement: it turns an optimized program into a GeneratedCode value that
// holds the position-independent machine code plus the offset map, one byte offset per IR
// instruction, which the execution engine adds to the code base to compute a re-entry address.
// All backends share the same register discipline: a cache register mirrors tape[index] between
// pointer moves and is written back before every move and at the exit point. HostCalls carries
// the absolute addresses of the host callbacks the generated code calls into.

//! Native code generation.
//!
//! # Generated routine
//!
//! Every backend emits one routine with the C signature
//!
//! ```text
//! u64 entry(u8 *tape, u64 index, const u8 *resume, u64 *counters)
//! ```
//!
//! It binds its registers, loads the cache register from `tape[index]` and
//! jumps to `resume`, which must be `code_base + offsets[ip]` for some
//! instruction `ip`. It returns the final tape index after writing the
//! cache register back. A bounds fault calls the out-of-bounds callback and
//! returns through the same frame without touching the tape.

use crate::core::{EngineOptions, FatalResult};
use crate::ir::Instruction;

/// Instruction set a backend generates code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArch {
    X64,
    Arm64,
}

impl TargetArch {
    /// Architecture of the running process, if a backend exists for it.
    pub const fn host() -> Option<TargetArch> {
        if cfg!(target_arch = "x86_64") {
            Some(TargetArch::X64)
        } else if cfg!(target_arch = "aarch64") {
            Some(TargetArch::Arm64)
        } else {
            None
        }
    }

    /// Generate code for this architecture.
    pub fn generate(
        self,
        program: &[Instruction],
        options: &CodegenOptions,
    ) -> FatalResult<GeneratedCode> {
        match self {
            TargetArch::X64 => crate::x64::X64Codegen::new().generate(program, options),
            TargetArch::Arm64 => crate::arm64::Arm64Codegen::new().generate(program, options),
        }
    }
}

/// Absolute addresses of the host functions generated code calls.
///
/// Both are `extern "C"` functions taking one `u64` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCalls {
    /// Receives the cell value of an `Output` in its low byte.
    pub put_byte: u64,
    /// Receives the faulting tape index.
    pub out_of_bounds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
    pub tape_capacity: usize,
    /// Increment the per-kind counter block at the start of every instruction.
    pub debug_counters: bool,
    pub host: HostCalls,
}

impl CodegenOptions {
    pub fn new(engine: &EngineOptions, host: HostCalls) -> Self {
        Self {
            tape_capacity: engine.tape_capacity,
            debug_counters: engine.debug_counters,
            host,
        }
    }
}

/// Output of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: Vec<u8>,
    /// `offsets[i]` is where instruction `i`'s translation starts in `code`.
    pub offsets: Vec<usize>,
}

impl GeneratedCode {
    /// Offset to resume at for instruction `ip`, or `None` once the program
    /// has finished.
    pub fn resume_offset(&self, ip: usize) -> Option<usize> {
        self.offsets.get(ip).copied()
    }
}

/// One backend per target ISA.
pub trait CodeGenerator {
    /// Translate `program` into a callable routine and its offset map.
    fn generate(
        &mut self,
        program: &[Instruction],
        options: &CodegenOptions,
    ) -> FatalResult<GeneratedCode>;
}
