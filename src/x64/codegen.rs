// This module translates IR into a System V x86-64 routine. Register roles are fixed for the
// whole routine: RCX holds the tape base, RDX the tape index, R8B caches tape[index], R10 points
// at the counter block and R11 is scratch. The entry sequence moves the arguments out of
// RDI/RSI/RDX/RCX into those roles, loads the cache and jumps straight to the resume address.
// Pointer moves spill the cache, adjust and bounds-check the index with an unsigned compare and
// reload the cache; Output saves the live caller-saved registers, aligns RSP to 16 bytes and
// calls the host. Loops use a stack of (start, end) labels that mirrors the IR nesting.

//! System V x86-64 backend.

use super::encoder::{JumpCondition, X64Encoder};
use crate::codegen::{CodeGenerator, CodegenOptions, GeneratedCode};
use crate::core::{EncodingError, FatalError, FatalResult, InstructionCounters};
use crate::ir::Instruction;
use iced_x86::code_asm::*;

#[cfg(all(windows, target_arch = "x86_64"))]
compile_error!("host calls from generated code do not implement the Windows x64 calling convention");

/// Tape base address, constant for the run.
const DATA_BASE: AsmRegister64 = rcx;
/// Tape index.
const DATA_INDEX: AsmRegister64 = rdx;
/// Cached value of `tape[index]`.
const CACHE: AsmRegister8 = r8b;
const CACHE_WIDE: AsmRegister64 = r8;
const CACHE_32: AsmRegister32 = r8d;
const RESUME: AsmRegister64 = r9;
/// Counter block, only bound with debug counters.
const COUNTERS: AsmRegister64 = r10;
const SCRATCH: AsmRegister64 = r11;

/// x86-64 code generator.
#[derive(Debug, Default)]
pub struct X64Codegen;

impl X64Codegen {
    pub fn new() -> Self {
        Self
    }

    fn emit_entry(&self, enc: &mut X64Encoder) -> Result<(), EncodingError> {
        enc.emit_prologue()?;
        // rdi = tape, rsi = index, rdx = resume, rcx = counters
        enc.mov_reg_reg(RESUME, rdx)?;
        enc.mov_reg_reg(COUNTERS, rcx)?;
        enc.mov_reg_reg(DATA_BASE, rdi)?;
        enc.mov_reg_reg(DATA_INDEX, rsi)?;
        enc.load_byte_zero_extend(CACHE_32, DATA_BASE, DATA_INDEX)?;
        enc.jmp_reg(RESUME)
    }

    fn emit_move_pointer(
        &self,
        enc: &mut X64Encoder,
        delta: i64,
        last_index: i32,
        out_of_bounds: CodeLabel,
    ) -> Result<(), EncodingError> {
        enc.store_byte(DATA_BASE, DATA_INDEX, CACHE)?;
        enc.add_reg_imm(DATA_INDEX, delta, SCRATCH)?;
        // negative indices wrap to huge unsigned values
        enc.cmp_reg_imm(DATA_INDEX, last_index)?;
        enc.jmp_conditional(JumpCondition::Above, out_of_bounds)?;
        enc.load_byte(CACHE, DATA_BASE, DATA_INDEX)
    }

    fn emit_output(&self, enc: &mut X64Encoder, options: &CodegenOptions) -> Result<(), EncodingError> {
        enc.push_reg(DATA_BASE)?;
        enc.push_reg(DATA_INDEX)?;
        enc.push_reg(CACHE_WIDE)?;
        if options.debug_counters {
            enc.push_reg(COUNTERS)?;
        }
        enc.movzx_reg8_to_reg32(edi, CACHE)?;

        enc.align_stack()?;
        enc.call_absolute(options.host.put_byte)?;
        enc.restore_stack()?;

        if options.debug_counters {
            enc.pop_reg(COUNTERS)?;
        }
        enc.pop_reg(CACHE_WIDE)?;
        enc.pop_reg(DATA_INDEX)?;
        enc.pop_reg(DATA_BASE)
    }

    fn emit_exit(&self, enc: &mut X64Encoder) -> Result<(), EncodingError> {
        enc.store_byte(DATA_BASE, DATA_INDEX, CACHE)?;
        enc.mov_reg_reg(rax, DATA_INDEX)?;
        enc.emit_epilogue()
    }

    fn emit_out_of_bounds(
        &self,
        enc: &mut X64Encoder,
        options: &CodegenOptions,
    ) -> Result<(), EncodingError> {
        enc.mov_reg_reg(rdi, DATA_INDEX)?;
        enc.align_stack()?;
        enc.call_absolute(options.host.out_of_bounds)?;
        enc.restore_stack()?;
        // unwinds everything pushed since the entry
        enc.emit_epilogue()
    }
}

impl CodeGenerator for X64Codegen {
    fn generate(
        &mut self,
        program: &[Instruction],
        options: &CodegenOptions,
    ) -> FatalResult<GeneratedCode> {
        let last_index = options
            .tape_capacity
            .checked_sub(1)
            .and_then(|last| i32::try_from(last).ok())
            .ok_or(FatalError::InvalidTapeCapacity {
                capacity: options.tape_capacity,
            })?;

        let mut enc = X64Encoder::new()?;
        let mut exit = enc.create_label();
        let mut out_of_bounds = enc.create_label();
        let mut marks = Vec::with_capacity(program.len());
        let mut loops: Vec<(CodeLabel, CodeLabel)> = Vec::new();

        self.emit_entry(&mut enc)?;

        for (ip, &inst) in program.iter().enumerate() {
            let mut mark = enc.create_label();
            enc.bind(&mut mark)?;
            marks.push(mark);

            if options.debug_counters {
                let slot = InstructionCounters::slot_offset(inst.kind());
                enc.increment_qword(COUNTERS, slot, SCRATCH)?;
            }

            match inst {
                Instruction::Mod(delta) => enc.add8_imm(CACHE, delta)?,
                Instruction::MovePointer(delta) => {
                    self.emit_move_pointer(&mut enc, delta, last_index, out_of_bounds)?
                }
                Instruction::Output => self.emit_output(&mut enc, options)?,
                Instruction::LoopBegin(_) => {
                    let mut start = enc.create_label();
                    let end = enc.create_label();
                    enc.bind(&mut start)?;
                    enc.cmp8_reg_imm(CACHE, 0)?;
                    enc.jmp_conditional(JumpCondition::Equal, end)?;
                    loops.push((start, end));
                }
                Instruction::LoopEnd(_) => {
                    let (start, mut end) = loops.pop().ok_or(EncodingError::UnbalancedLoop(ip))?;
                    enc.jmp(start)?;
                    enc.bind(&mut end)?;
                }
                Instruction::SetValue(0) => enc.zero_reg32(CACHE_32)?,
                Instruction::SetValue(value) => enc.mov8_imm(CACHE, value)?,
                Instruction::Input | Instruction::Halt(_) => {
                    return Err(FatalError::UnsupportedInstruction { ip, instruction: inst });
                }
            }
        }
        if !loops.is_empty() {
            return Err(EncodingError::UnbalancedLoop(program.len()).into());
        }

        enc.bind(&mut exit)?;
        self.emit_exit(&mut enc)?;
        enc.bind(&mut out_of_bounds)?;
        self.emit_out_of_bounds(&mut enc, options)?;

        let (code, offsets) = enc.finalize(&marks)?;
        log::debug!(
            "x64: generated {} bytes for {} instructions",
            code.len(),
            program.len()
        );
        Ok(GeneratedCode { code, offsets })
    }
}
