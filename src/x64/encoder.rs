// This module wraps the iced-x86 CodeAssembler for the x86-64 backend. X64Encoder exposes the
// handful of instruction forms the tape routine needs: register and immediate moves, byte loads
// and stores through a base+index address, byte and 64-bit adds, compares, pushes and pops, an
// absolute call through RAX, label-based conditional and unconditional jumps, and a counter
// increment through a scratch register. Every label is followed by a zero-byte instruction so
// that several labels can share one address; finalize assembles at address zero with
// RETURN_NEW_INSTRUCTION_OFFSETS so label positions can be read back as code offsets.

//! x86-64 instruction encoding using iced-x86.

use crate::core::EncodingError;
use iced_x86::code_asm::*;
use iced_x86::{BlockEncoderOptions, IcedError};

fn asm_err(e: IcedError) -> EncodingError {
    EncodingError::Assembler(e.to_string())
}

/// Jump conditions for conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCondition {
    Equal,
    /// Unsigned greater-than.
    Above,
}

/// x86-64 instruction encoder.
pub struct X64Encoder {
    assembler: CodeAssembler,
}

impl X64Encoder {
    pub fn new() -> Result<Self, EncodingError> {
        let assembler = CodeAssembler::new(64).map_err(asm_err)?;
        Ok(Self { assembler })
    }

    pub fn create_label(&mut self) -> CodeLabel {
        self.assembler.create_label()
    }

    /// Bind `label` to the current position.
    pub fn bind(&mut self, label: &mut CodeLabel) -> Result<(), EncodingError> {
        self.assembler.set_label(label).map_err(asm_err)?;
        self.assembler.zero_bytes().map_err(asm_err)
    }

    /// Emit MOV instruction - register to register.
    pub fn mov_reg_reg(
        &mut self,
        dst: AsmRegister64,
        src: AsmRegister64,
    ) -> Result<(), EncodingError> {
        self.assembler.mov(dst, src).map_err(asm_err)
    }

    /// `dst = byte [base + index]`, leaving the upper bits of `dst` untouched.
    pub fn load_byte(
        &mut self,
        dst: AsmRegister8,
        base: AsmRegister64,
        index: AsmRegister64,
    ) -> Result<(), EncodingError> {
        self.assembler
            .mov(dst, byte_ptr(base + index))
            .map_err(asm_err)
    }

    /// `dst = zero_extend(byte [base + index])`.
    pub fn load_byte_zero_extend(
        &mut self,
        dst: AsmRegister32,
        base: AsmRegister64,
        index: AsmRegister64,
    ) -> Result<(), EncodingError> {
        self.assembler
            .movzx(dst, byte_ptr(base + index))
            .map_err(asm_err)
    }

    /// `byte [base + index] = src`.
    pub fn store_byte(
        &mut self,
        base: AsmRegister64,
        index: AsmRegister64,
        src: AsmRegister8,
    ) -> Result<(), EncodingError> {
        self.assembler
            .mov(byte_ptr(base + index), src)
            .map_err(asm_err)
    }

    /// Emit MOVZX instruction - 8-bit to 32-bit zero extension.
    pub fn movzx_reg8_to_reg32(
        &mut self,
        dst: AsmRegister32,
        src: AsmRegister8,
    ) -> Result<(), EncodingError> {
        self.assembler.movzx(dst, src).map_err(asm_err)
    }

    /// 8-bit add; the register wraps at 256 on its own.
    pub fn add8_imm(&mut self, dst: AsmRegister8, imm: u8) -> Result<(), EncodingError> {
        self.assembler.add(dst, imm as i32).map_err(asm_err)
    }

    pub fn mov8_imm(&mut self, dst: AsmRegister8, imm: u8) -> Result<(), EncodingError> {
        self.assembler.mov(dst, imm as i32).map_err(asm_err)
    }

    /// Zero a register through its 32-bit view.
    pub fn zero_reg32(&mut self, reg: AsmRegister32) -> Result<(), EncodingError> {
        self.assembler.xor(reg, reg).map_err(asm_err)
    }

    /// 64-bit add of an arbitrary immediate; values outside the sign-extended
    /// 32-bit range go through `scratch`.
    pub fn add_reg_imm(
        &mut self,
        dst: AsmRegister64,
        imm: i64,
        scratch: AsmRegister64,
    ) -> Result<(), EncodingError> {
        match i32::try_from(imm) {
            Ok(imm) => self.assembler.add(dst, imm).map_err(asm_err),
            Err(_) => {
                self.assembler.mov(scratch, imm).map_err(asm_err)?;
                self.assembler.add(dst, scratch).map_err(asm_err)
            }
        }
    }

    /// Emit CMP instruction - immediate to 64-bit register.
    pub fn cmp_reg_imm(&mut self, reg: AsmRegister64, imm: i32) -> Result<(), EncodingError> {
        self.assembler.cmp(reg, imm).map_err(asm_err)
    }

    /// Emit CMP instruction - immediate to 8-bit register.
    pub fn cmp8_reg_imm(&mut self, reg: AsmRegister8, imm: u8) -> Result<(), EncodingError> {
        self.assembler.cmp(reg, imm as i32).map_err(asm_err)
    }

    pub fn push_reg(&mut self, reg: AsmRegister64) -> Result<(), EncodingError> {
        self.assembler.push(reg).map_err(asm_err)
    }

    pub fn pop_reg(&mut self, reg: AsmRegister64) -> Result<(), EncodingError> {
        self.assembler.pop(reg).map_err(asm_err)
    }

    /// Open a scratch frame in RBP and round RSP down to 16 bytes, as the
    /// ABI requires at every call instruction.
    pub fn align_stack(&mut self) -> Result<(), EncodingError> {
        self.assembler.push(rbp).map_err(asm_err)?;
        self.assembler.mov(rbp, rsp).map_err(asm_err)?;
        self.assembler.and(rsp, -16).map_err(asm_err)
    }

    /// Undo [`Self::align_stack`].
    pub fn restore_stack(&mut self) -> Result<(), EncodingError> {
        self.assembler.mov(rsp, rbp).map_err(asm_err)?;
        self.assembler.pop(rbp).map_err(asm_err)
    }

    /// Call an absolute address through RAX.
    pub fn call_absolute(&mut self, target: u64) -> Result<(), EncodingError> {
        self.assembler.mov(rax, target).map_err(asm_err)?;
        self.assembler.call(rax).map_err(asm_err)
    }

    pub fn ret(&mut self) -> Result<(), EncodingError> {
        self.assembler.ret().map_err(asm_err)
    }

    pub fn jmp_reg(&mut self, target: AsmRegister64) -> Result<(), EncodingError> {
        self.assembler.jmp(target).map_err(asm_err)
    }

    pub fn jmp(&mut self, label: CodeLabel) -> Result<(), EncodingError> {
        self.assembler.jmp(label).map_err(asm_err)
    }

    pub fn jmp_conditional(
        &mut self,
        condition: JumpCondition,
        label: CodeLabel,
    ) -> Result<(), EncodingError> {
        match condition {
            JumpCondition::Equal => self.assembler.je(label),
            JumpCondition::Above => self.assembler.ja(label),
        }
        .map_err(asm_err)
    }

    /// `qword [base + offset] += 1` as load, add, store through `scratch`.
    pub fn increment_qword(
        &mut self,
        base: AsmRegister64,
        offset: i32,
        scratch: AsmRegister64,
    ) -> Result<(), EncodingError> {
        self.assembler
            .mov(scratch, qword_ptr(base + offset))
            .map_err(asm_err)?;
        self.assembler.add(scratch, 1).map_err(asm_err)?;
        self.assembler
            .mov(qword_ptr(base + offset), scratch)
            .map_err(asm_err)
    }

    /// Emit prologue: push rbp; mov rbp, rsp.
    pub fn emit_prologue(&mut self) -> Result<(), EncodingError> {
        self.assembler.push(rbp).map_err(asm_err)?;
        self.assembler.mov(rbp, rsp).map_err(asm_err)
    }

    /// Emit epilogue: mov rsp, rbp; pop rbp; ret.
    pub fn emit_epilogue(&mut self) -> Result<(), EncodingError> {
        self.assembler.mov(rsp, rbp).map_err(asm_err)?;
        self.assembler.pop(rbp).map_err(asm_err)?;
        self.assembler.ret().map_err(asm_err)
    }

    /// Assemble at address zero and report the offset of every label in
    /// `marks`, in order.
    pub fn finalize(mut self, marks: &[CodeLabel]) -> Result<(Vec<u8>, Vec<usize>), EncodingError> {
        let result = self
            .assembler
            .assemble_options(0, BlockEncoderOptions::RETURN_NEW_INSTRUCTION_OFFSETS)
            .map_err(asm_err)?;

        let offsets = marks
            .iter()
            .map(|label| result.label_ip(label).map(|ip| ip as usize).map_err(asm_err))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((result.inner.code_buffer, offsets))
    }
}
