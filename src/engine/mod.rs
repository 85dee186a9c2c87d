//! Native execution engine.
//!
//! [`JitEngine`] generates code for the host architecture, maps it
//! executable and enters it at the offset of the current instruction, so a
//! run can start from scratch or pick up a tape and cursor left behind by
//! the interpreter.

mod host;
pub mod memory;

pub use memory::ExecutableBuffer;

use crate::codegen::{CodegenOptions, GeneratedCode, HostCalls, TargetArch};
use crate::core::{Cursor, EngineOptions, FatalError, FatalResult, InstructionCounters, Tape};
use crate::ir::Instruction;
use host::{HostFault, SinkGuard};
use std::io::Write;

/// `u64 entry(u8 *tape, u64 index, const u8 *resume, u64 *counters)`
type EntryFn = unsafe extern "C" fn(*mut u8, u64, *const u8, *mut u64) -> u64;

struct Compiled {
    generated: GeneratedCode,
    buffer: ExecutableBuffer,
}

/// Runs a program as native code.
pub struct JitEngine<'p> {
    program: &'p [Instruction],
    options: EngineOptions,
    arch: TargetArch,
    tape: Tape,
    cursor: Cursor,
    counters: Option<InstructionCounters>,
    compiled: Option<Compiled>,
}

impl<'p> JitEngine<'p> {
    pub fn new(program: &'p [Instruction], options: EngineOptions) -> FatalResult<Self> {
        let tape = options.new_tape()?;
        Self::with_state(program, tape, Cursor::default(), options)
    }

    /// Continue from an existing tape and cursor. The tape's capacity takes
    /// precedence over `options.tape_capacity`.
    pub fn with_state(
        program: &'p [Instruction],
        tape: Tape,
        cursor: Cursor,
        options: EngineOptions,
    ) -> FatalResult<Self> {
        let arch = TargetArch::host().ok_or(FatalError::UnsupportedHost)?;
        if cursor.ptr >= tape.capacity() {
            return Err(FatalError::TapeOutOfBounds {
                index: cursor.ptr as i64,
                capacity: tape.capacity(),
            });
        }
        let options = options.with_tape_capacity(tape.capacity());
        Ok(Self {
            program,
            options,
            arch,
            tape,
            cursor,
            counters: options.debug_counters.then(InstructionCounters::new),
            compiled: None,
        })
    }

    /// Generate and map the routine. Later calls are no-ops.
    pub fn compile(&mut self) -> FatalResult<()> {
        if self.compiled.is_some() {
            return Ok(());
        }
        let generated = self
            .arch
            .generate(self.program, &CodegenOptions::new(&self.options, host_calls()))?;
        let buffer = ExecutableBuffer::from_code(&generated.code)?;
        log::info!(
            "compiled {} instructions into {} bytes of {:?} code",
            self.program.len(),
            generated.code.len(),
            self.arch
        );
        self.compiled = Some(Compiled { generated, buffer });
        Ok(())
    }

    pub fn finished(&self) -> bool {
        self.cursor.ip >= self.program.len()
    }

    /// Run from the current instruction to the end of the program.
    pub fn run_to_end(&mut self, out: &mut dyn Write) -> FatalResult<()> {
        if self.finished() {
            return Ok(());
        }
        self.compile()?;
        let Some(compiled) = self.compiled.as_ref() else {
            return Ok(());
        };
        let Some(offset) = compiled.generated.resume_offset(self.cursor.ip) else {
            return Ok(());
        };

        let base = compiled.buffer.as_ptr();
        // SAFETY: the buffer holds a routine with the EntryFn signature at
        // offset 0 and `offset` is one of its instruction boundaries.
        let entry: EntryFn = unsafe { std::mem::transmute::<*const u8, EntryFn>(base) };
        let resume = unsafe { base.add(offset) };
        let counters = self
            .counters
            .as_mut()
            .map_or(std::ptr::null_mut(), |counters| counters.as_mut_ptr());

        log::debug!("entering native code at ip {} (offset {:#x})", self.cursor.ip, offset);
        let guard = SinkGuard::install(out);
        // SAFETY: the tape outlives the call and every index the routine
        // dereferences is bounds-checked against its capacity.
        let index = unsafe { entry(self.tape.as_mut_ptr(), self.cursor.ptr as u64, resume, counters) };
        drop(guard);

        match host::take_fault() {
            Some(HostFault::OutOfBounds(index)) => {
                return Err(FatalError::TapeOutOfBounds {
                    index: index as i64,
                    capacity: self.tape.capacity(),
                });
            }
            Some(HostFault::Output(err)) => return Err(FatalError::Output(err)),
            None => {}
        }

        self.cursor = Cursor {
            ip: self.program.len(),
            ptr: index as usize,
        };
        out.flush()?;
        Ok(())
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn counters(&self) -> Option<&InstructionCounters> {
        self.counters.as_ref()
    }

    /// The routine, once [`compile`](Self::compile) has run.
    pub fn generated(&self) -> Option<&GeneratedCode> {
        self.compiled.as_ref().map(|compiled| &compiled.generated)
    }

    pub fn into_state(self) -> (Tape, Cursor) {
        (self.tape, self.cursor)
    }
}

/// Addresses of the host callbacks linked into generated code.
pub fn host_calls() -> HostCalls {
    HostCalls {
        put_byte: host::put_byte_address(),
        out_of_bounds: host::out_of_bounds_address(),
    }
}

/// Compile `program` natively, run it and collect its output.
pub fn execute(program: &[Instruction], options: EngineOptions) -> FatalResult<Vec<u8>> {
    let mut out = Vec::new();
    JitEngine::new(program, options)?.run_to_end(&mut out)?;
    Ok(out)
}

#[cfg(all(test, unix, any(target_arch = "x86_64", target_arch = "aarch64")))]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use crate::ir::{optimize, parse, InstructionKind};

    fn compile(source: &str) -> Vec<Instruction> {
        optimize(&parse(source).unwrap()).unwrap()
    }

    #[test]
    fn runs_simple_output() {
        let program = compile("+++.>++.");
        assert_eq!(execute(&program, EngineOptions::default()).unwrap(), vec![3, 2]);
    }

    #[test]
    fn loops_and_clears() {
        let program = compile("++++[>+++<-]>.[-].");
        assert_eq!(execute(&program, EngineOptions::default()).unwrap(), vec![12, 0]);
    }

    #[test]
    fn writes_the_cache_back_to_the_tape() {
        let program = compile("+>++>+++<");
        let mut engine = JitEngine::new(&program, EngineOptions::default()).unwrap();
        engine.run_to_end(&mut Vec::new()).unwrap();
        assert_eq!(&engine.tape().cells()[..4], &[1, 2, 3, 0]);
        assert_eq!(engine.cursor(), Cursor { ip: program.len(), ptr: 1 });
    }

    #[test]
    fn faults_on_either_end() {
        let program = compile("+<");
        let err = execute(&program, EngineOptions::default()).unwrap_err();
        assert!(matches!(err, FatalError::TapeOutOfBounds { index: -1, capacity: 4096 }));

        let program = compile(">>>>.");
        let options = EngineOptions::default().with_tape_capacity(4);
        let mut out = Vec::new();
        let err = JitEngine::new(&program, options)
            .unwrap()
            .run_to_end(&mut out)
            .unwrap_err();
        assert!(matches!(err, FatalError::TapeOutOfBounds { index: 4, capacity: 4 }));
        assert!(out.is_empty());
    }

    #[test]
    fn resumes_interpreter_state() {
        let program = compile("++++++++[>++++++++<-]>+.+.");
        let mut interp = Interpreter::new(&program, EngineOptions::default()).unwrap();
        let mut out = Vec::new();
        // stop in the middle of the loop
        for _ in 0..10 {
            interp.step(&mut out).unwrap();
        }
        let (tape, cursor) = interp.into_state();

        let mut engine = JitEngine::with_state(&program, tape, cursor, EngineOptions::default()).unwrap();
        engine.run_to_end(&mut out).unwrap();
        assert_eq!(out, b"AB");
    }

    #[test]
    fn finished_engine_is_a_no_op() {
        let program = compile("+.");
        let mut engine = JitEngine::new(&program, EngineOptions::default()).unwrap();
        let mut out = Vec::new();
        engine.run_to_end(&mut out).unwrap();
        engine.run_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn counts_like_the_interpreter() {
        let program = parse("++[>+<-]>.").unwrap();
        let options = EngineOptions::default().with_debug_counters(true);
        let mut engine = JitEngine::new(&program, options).unwrap();
        engine.run_to_end(&mut Vec::new()).unwrap();

        let counters = engine.counters().unwrap();
        assert_eq!(counters.get(InstructionKind::LoopBegin), 1);
        assert_eq!(counters.get(InstructionKind::LoopEnd), 2);
        assert_eq!(counters.get(InstructionKind::Output), 1);
        assert_eq!(counters.get(InstructionKind::Mod), 6);
        assert_eq!(counters.get(InstructionKind::MovePointer), 5);
    }

    #[test]
    fn rejects_input() {
        let program = compile(",");
        assert!(matches!(
            execute(&program, EngineOptions::default()),
            Err(FatalError::UnsupportedInstruction { ip: 0, .. })
        ));
    }
}
