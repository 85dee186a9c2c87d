// This module translates IR into an AAPCS64 routine with the same shape as the x86-64 one,
// assembled with dynasmrt into a VecAssembler at base address zero so the bytes stay
// position-independent. X9 holds the tape base, X10 the tape index and W11 caches
// tape[index]; X12 points at the counter block, X13/X14 are scratch and X16 carries host
// call targets. The cache register is masked back to a byte after every add since A64 has no
// 8-bit arithmetic. Loops compare the cache register against zero and take a predicated
// branch between dynamic labels for both ends; host calls save the live registers in a
// 32-byte slot so SP stays 16-byte aligned.

//! AArch64 backend.

use dynasmrt::aarch64::Aarch64Relocation;
use dynasmrt::{dynasm, DynamicLabel, DynasmApi, DynasmLabelApi, VecAssembler};

use crate::codegen::{CodeGenerator, CodegenOptions, GeneratedCode};
use crate::core::{EncodingError, FatalError, FatalResult, InstructionCounters};
use crate::ir::Instruction;

type Ops = VecAssembler<Aarch64Relocation>;

/// Largest unsigned immediate of an add, sub or cmp.
const IMM12_MAX: u64 = 4095;

/// movz/movk sequence for an arbitrary 64-bit value, skipping zero halfwords.
fn load_imm64(ops: &mut Ops, reg: u8, value: u64) {
    let reg = u32::from(reg);
    let p0 = (value & 0xFFFF) as u32;
    let p1 = ((value >> 16) & 0xFFFF) as u32;
    let p2 = ((value >> 32) & 0xFFFF) as u32;
    let p3 = ((value >> 48) & 0xFFFF) as u32;
    dynasm!(ops ; .arch aarch64 ; movz X(reg), #p0);
    if p1 != 0 {
        dynasm!(ops ; .arch aarch64 ; movk X(reg), #p1, LSL #16);
    }
    if p2 != 0 {
        dynasm!(ops ; .arch aarch64 ; movk X(reg), #p2, LSL #32);
    }
    if p3 != 0 {
        dynasm!(ops ; .arch aarch64 ; movk X(reg), #p3, LSL #48);
    }
}

/// AArch64 code generator.
#[derive(Debug, Default)]
pub struct Arm64Codegen;

impl Arm64Codegen {
    pub fn new() -> Self {
        Self
    }

    fn emit_entry(&self, ops: &mut Ops) {
        // x0 = tape, x1 = index, x2 = resume, x3 = counters
        dynasm!(ops
            ; .arch aarch64
            ; stp x29, x30, [sp, #-16]!
            ; mov x29, sp
            ; mov x9, x0
            ; mov x10, x1
            ; mov x12, x3
            ; ldrb w11, [x9, x10]
            ; br x2
        );
    }

    fn emit_epilogue(&self, ops: &mut Ops) {
        dynasm!(ops
            ; .arch aarch64
            ; mov sp, x29
            ; ldp x29, x30, [sp], #16
            ; ret
        );
    }

    fn emit_move_pointer(
        &self,
        ops: &mut Ops,
        delta: i64,
        last_index: u64,
        out_of_bounds: DynamicLabel,
    ) {
        dynasm!(ops ; .arch aarch64 ; strb w11, [x9, x10]);
        let magnitude = delta.unsigned_abs();
        if magnitude <= IMM12_MAX {
            let imm = magnitude as u32;
            if delta >= 0 {
                dynasm!(ops ; .arch aarch64 ; add x10, x10, #imm);
            } else {
                dynasm!(ops ; .arch aarch64 ; sub x10, x10, #imm);
            }
        } else {
            load_imm64(ops, 13, delta as u64);
            dynasm!(ops ; .arch aarch64 ; add x10, x10, x13);
        }

        // unsigned compare, so an index below zero lands above the limit
        if last_index <= IMM12_MAX {
            let limit = last_index as u32;
            dynasm!(ops ; .arch aarch64 ; cmp x10, #limit);
        } else {
            load_imm64(ops, 14, last_index);
            dynasm!(ops ; .arch aarch64 ; cmp x10, x14);
        }
        dynasm!(ops
            ; .arch aarch64
            ; b.hi =>out_of_bounds
            ; ldrb w11, [x9, x10]
        );
    }

    fn emit_output(&self, ops: &mut Ops, options: &CodegenOptions) {
        dynasm!(ops
            ; .arch aarch64
            ; stp x9, x10, [sp, #-32]!
            ; stp x11, x12, [sp, #16]
            ; and w0, w11, #0xff
        );
        load_imm64(ops, 16, options.host.put_byte);
        dynasm!(ops
            ; .arch aarch64
            ; blr x16
            ; ldp x11, x12, [sp, #16]
            ; ldp x9, x10, [sp], #32
        );
    }

    fn emit_exit(&self, ops: &mut Ops) {
        dynasm!(ops
            ; .arch aarch64
            ; strb w11, [x9, x10]
            ; mov x0, x10
        );
        self.emit_epilogue(ops);
    }

    fn emit_out_of_bounds(&self, ops: &mut Ops, options: &CodegenOptions) {
        dynasm!(ops ; .arch aarch64 ; mov x0, x10);
        load_imm64(ops, 16, options.host.out_of_bounds);
        dynasm!(ops ; .arch aarch64 ; blr x16);
        self.emit_epilogue(ops);
    }

    fn emit_counter(&self, ops: &mut Ops, offset: u32) {
        dynasm!(ops
            ; .arch aarch64
            ; ldr x13, [x12, #offset]
            ; add x13, x13, #1
            ; str x13, [x12, #offset]
        );
    }
}

impl CodeGenerator for Arm64Codegen {
    fn generate(
        &mut self,
        program: &[Instruction],
        options: &CodegenOptions,
    ) -> FatalResult<GeneratedCode> {
        let last_index = options
            .tape_capacity
            .checked_sub(1)
            .ok_or(FatalError::InvalidTapeCapacity {
                capacity: options.tape_capacity,
            })? as u64;

        let mut ops = Ops::new(0);
        let out_of_bounds = ops.new_dynamic_label();
        let mut offsets = Vec::with_capacity(program.len());
        let mut loops: Vec<(DynamicLabel, DynamicLabel)> = Vec::new();

        self.emit_entry(&mut ops);

        for (ip, &inst) in program.iter().enumerate() {
            offsets.push(ops.offset().0);

            if options.debug_counters {
                self.emit_counter(&mut ops, InstructionCounters::slot_offset(inst.kind()) as u32);
            }

            match inst {
                Instruction::Mod(delta) => {
                    let imm = u32::from(delta);
                    dynasm!(ops
                        ; .arch aarch64
                        ; add w11, w11, #imm
                        ; and w11, w11, #0xff
                    );
                }
                Instruction::MovePointer(delta) => {
                    self.emit_move_pointer(&mut ops, delta, last_index, out_of_bounds)
                }
                Instruction::Output => self.emit_output(&mut ops, options),
                Instruction::LoopBegin(_) => {
                    let start = ops.new_dynamic_label();
                    let end = ops.new_dynamic_label();
                    dynasm!(ops
                        ; .arch aarch64
                        ; =>start
                        ; cmp w11, #0
                        ; b.eq =>end
                    );
                    loops.push((start, end));
                }
                Instruction::LoopEnd(_) => {
                    let (start, end) = loops.pop().ok_or(EncodingError::UnbalancedLoop(ip))?;
                    dynasm!(ops
                        ; .arch aarch64
                        ; b =>start
                        ; =>end
                    );
                }
                Instruction::SetValue(value) => {
                    let imm = u32::from(value);
                    dynasm!(ops ; .arch aarch64 ; movz w11, #imm);
                }
                Instruction::Input | Instruction::Halt(_) => {
                    return Err(FatalError::UnsupportedInstruction { ip, instruction: inst });
                }
            }
        }
        if !loops.is_empty() {
            return Err(EncodingError::UnbalancedLoop(program.len()).into());
        }

        self.emit_exit(&mut ops);
        dynasm!(ops ; .arch aarch64 ; =>out_of_bounds);
        self.emit_out_of_bounds(&mut ops, options);

        let code = ops
            .finalize()
            .map_err(|e| EncodingError::Assembler(e.to_string()))?;
        log::debug!(
            "arm64: generated {} bytes for {} instructions",
            code.len(),
            program.len()
        );
        Ok(GeneratedCode { code, offsets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::HostCalls;
    use crate::core::EngineOptions;
    use crate::ir::{optimize, parse, HaltReason};

    fn options(engine: EngineOptions) -> CodegenOptions {
        CodegenOptions::new(
            &engine,
            HostCalls {
                put_byte: 0x1234,
                out_of_bounds: 0x5678,
            },
        )
    }

    fn generate(source: &str, engine: EngineOptions) -> GeneratedCode {
        let program = optimize(&parse(source).unwrap()).unwrap();
        Arm64Codegen::new().generate(&program, &options(engine)).unwrap()
    }

    fn word(code: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([code[offset], code[offset + 1], code[offset + 2], code[offset + 3]])
    }

    #[test]
    fn entry_jumps_to_resume_argument() {
        let code = generate("", EngineOptions::default());
        assert!(code.offsets.is_empty());
        // stp, mov x29, three argument moves, ldrb, br x2
        assert_eq!(word(&code.code, 0), 0xA9BF7BFD);
        assert_eq!(word(&code.code, 4), 0x910003FD);
        assert_eq!(word(&code.code, 20), 0x386A692B);
        assert_eq!(word(&code.code, 24), 0xD61F0040);
        assert_eq!(code.code.len() % 4, 0);
    }

    #[test]
    fn mod_masks_the_cache_register() {
        let code = generate("-", EngineOptions::default());
        let at = code.offsets[0];
        assert_eq!(word(&code.code, at), 0x1103FD6B);
        assert_eq!(word(&code.code, at + 4), 0x12001D6B);
    }

    #[test]
    fn move_pointer_writes_back_then_checks_bounds() {
        let code = generate(">", EngineOptions::default());
        let at = code.offsets[0];
        // strb w11, [x9, x10]; add x10, x10, #1
        assert_eq!(word(&code.code, at), 0x382A692B);
        assert_eq!(word(&code.code, at + 4), 0x9100054A);
    }

    #[test]
    fn large_tapes_compare_against_a_register() {
        let small = generate(">", EngineOptions::default());
        let large = generate(">", EngineOptions::default().with_tape_capacity(1 << 20));
        assert!(large.code.len() > small.code.len());
    }

    #[test]
    fn large_pointer_moves_go_through_scratch() {
        let options = options(EngineOptions::default().with_tape_capacity(1 << 20));
        let near = Arm64Codegen::new()
            .generate(&[Instruction::MovePointer(-4095)], &options)
            .unwrap();
        let far = Arm64Codegen::new()
            .generate(&[Instruction::MovePointer(-5000)], &options)
            .unwrap();
        assert!(far.code.len() > near.code.len());
    }

    #[test]
    fn offsets_follow_program_order() {
        let code = generate("+[->+<]>.", EngineOptions::default().with_debug_counters(true));
        assert_eq!(code.offsets.len(), 9);
        assert!(code.offsets.windows(2).all(|w| w[0] < w[1]));
        assert!(code.offsets.iter().all(|offset| offset % 4 == 0));
    }

    #[test]
    fn rejects_input_and_halt() {
        let options = options(EngineOptions::default());
        let err = Arm64Codegen::new()
            .generate(&[Instruction::Input], &options)
            .unwrap_err();
        assert!(matches!(err, FatalError::UnsupportedInstruction { ip: 0, .. }));

        let program = [Instruction::Mod(1), Instruction::Halt(HaltReason::InfiniteLoop)];
        let err = Arm64Codegen::new().generate(&program, &options).unwrap_err();
        assert!(matches!(err, FatalError::UnsupportedInstruction { ip: 1, .. }));
    }

    #[test]
    fn unbalanced_loops_are_rejected() {
        let options = options(EngineOptions::default());
        let err = Arm64Codegen::new()
            .generate(&[Instruction::LoopEnd(0)], &options)
            .unwrap_err();
        assert!(matches!(err, FatalError::Codegen(EncodingError::UnbalancedLoop(0))));
    }
}
