//! Reference interpreter.
//!
//! This is the ground truth for what a program means. The native backends
//! are tested for byte-identical output against it.

use crate::core::{
    Cursor, EngineOptions, FatalError, FatalResult, InstructionCounters, Tape,
};
use crate::ir::{HaltReason, Instruction};
use std::io::Write;

/// Steps through a program one instruction at a time.
pub struct Interpreter<'p> {
    program: &'p [Instruction],
    tape: Tape,
    cursor: Cursor,
    halted: bool,
    counters: Option<InstructionCounters>,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p [Instruction], options: EngineOptions) -> FatalResult<Self> {
        Ok(Self {
            program,
            tape: options.new_tape()?,
            cursor: Cursor::default(),
            halted: false,
            counters: options.debug_counters.then(InstructionCounters::new),
        })
    }

    pub fn finished(&self) -> bool {
        self.halted || self.cursor.ip >= self.program.len()
    }

    /// Execute one instruction. Returns `Ok(false)` once the program has
    /// finished or halted.
    pub fn step(&mut self, out: &mut dyn Write) -> FatalResult<bool> {
        if self.finished() {
            return Ok(false);
        }

        let ip = self.cursor.ip;
        let inst = self.program[ip];
        self.cursor.ip += 1;
        if let Some(counters) = self.counters.as_mut() {
            counters.record(inst.kind());
        }

        let ptr = self.cursor.ptr;
        match inst {
            Instruction::Mod(delta) => {
                let cell = self.tape.get(ptr)?;
                self.tape.set(ptr, cell.wrapping_add(delta))?;
            }
            Instruction::MovePointer(delta) => {
                self.cursor.ptr = self.tape.offset(ptr, delta)?;
            }
            Instruction::Input => return Err(FatalError::InputUnsupported { ip }),
            Instruction::Output => {
                out.write_all(&[self.tape.get(ptr)?])?;
            }
            Instruction::LoopBegin(end) => {
                if self.tape.get(ptr)? == 0 {
                    self.cursor.ip = end + 1;
                }
            }
            Instruction::LoopEnd(begin) => {
                if self.tape.get(ptr)? != 0 {
                    self.cursor.ip = begin + 1;
                }
            }
            Instruction::SetValue(value) => self.tape.set(ptr, value)?,
            Instruction::Halt(HaltReason::InfiniteLoop) => {
                // An empty loop entered with a zero cell is skipped.
                if self.tape.get(ptr)? == 0 {
                    return Ok(true);
                }
                log::warn!("halted, reason: infinite loop reached at instruction {}", ip);
                self.halted = true;
                return Ok(false);
            }
        }

        log::trace!("step {} {:?} -> ptr {}", ip, inst, self.cursor.ptr);
        Ok(true)
    }

    pub fn run_to_end(&mut self, out: &mut dyn Write) -> FatalResult<()> {
        while self.step(out)? {}
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

    /// Hand the tape and cursor over, e.g. to resume natively.
    pub fn into_state(self) -> (Tape, Cursor) {
        (self.tape, self.cursor)
    }
}

/// Parse-free convenience: interpret `program` and collect its output.
pub fn interpret(program: &[Instruction], options: EngineOptions) -> FatalResult<Vec<u8>> {
    let mut out = Vec::new();
    Interpreter::new(program, options)?.run_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{optimize, parse};
    use crate::ir::InstructionKind;

    fn run(source: &str) -> Vec<u8> {
        interpret(&parse(source).unwrap(), EngineOptions::default()).unwrap()
    }

    #[test]
    fn outputs_current_cell() {
        assert_eq!(run("+++."), vec![3]);
        assert_eq!(run("-."), vec![255]);
    }

    #[test]
    fn loops_until_cell_is_zero() {
        // 4 * 3 moved into the next cell
        assert_eq!(run("++++[>+++<-]>."), vec![12]);
        // a loop entered with a zero cell is skipped entirely
        assert_eq!(run(" [.+]+."), vec![1]);
    }

    #[test]
    fn set_value_clears_cell() {
        let program = optimize(&parse("+++++[-]").unwrap()).unwrap();
        assert_eq!(program, vec![Instruction::Mod(5), Instruction::SetValue(0)]);

        let mut interp = Interpreter::new(&program, EngineOptions::default()).unwrap();
        interp.run_to_end(&mut Vec::new()).unwrap();
        assert_eq!(interp.tape().get(0).unwrap(), 0);
    }

    #[test]
    fn moving_past_either_end_is_fatal() {
        let program = parse("<").unwrap();
        let err = interpret(&program, EngineOptions::default()).unwrap_err();
        assert!(matches!(err, FatalError::TapeOutOfBounds { index: -1, capacity: 4096 }));

        let program = parse(">>>>").unwrap();
        let options = EngineOptions::default().with_tape_capacity(4);
        let err = interpret(&program, options).unwrap_err();
        assert!(matches!(err, FatalError::TapeOutOfBounds { index: 4, capacity: 4 }));
    }

    #[test]
    fn input_is_fatal() {
        let err = interpret(&parse("+,").unwrap(), EngineOptions::default()).unwrap_err();
        assert!(matches!(err, FatalError::InputUnsupported { ip: 1 }));
    }

    #[test]
    fn step_reports_progress() {
        let program = parse("+.").unwrap();
        let mut interp = Interpreter::new(&program, EngineOptions::default()).unwrap();
        let mut out = Vec::new();
        assert!(interp.step(&mut out).unwrap());
        assert!(out.is_empty());
        assert!(interp.step(&mut out).unwrap());
        assert_eq!(out, vec![1]);
        assert!(!interp.step(&mut out).unwrap());
        assert!(interp.finished());
        assert_eq!(interp.cursor().ip, 2);
    }

    #[test]
    fn empty_loop_with_zero_cell_is_a_no_op() {
        let program = optimize(&parse(" []+.").unwrap()).unwrap();
        assert_eq!(program[0], Instruction::Halt(HaltReason::InfiniteLoop));
        assert_eq!(interpret(&program, EngineOptions::default()).unwrap(), vec![1]);
    }

    #[test]
    fn empty_loop_with_live_cell_halts() {
        let program = optimize(&parse("+[]+.").unwrap()).unwrap();
        let mut interp = Interpreter::new(&program, EngineOptions::default()).unwrap();
        let mut out = Vec::new();
        interp.run_to_end(&mut out).unwrap();
        assert!(out.is_empty());
        assert!(interp.finished());
        assert_eq!(interp.cursor().ip, 2);
    }

    #[test]
    fn halt_checks_the_tape_cell_not_the_instruction_pointer() {
        // ptr 0 holds 0 while tape[ip] (tape[3]) is non-zero: the halt is
        // skipped because the current cell is zero.
        let program = vec![
            Instruction::MovePointer(3),
            Instruction::Mod(7),
            Instruction::MovePointer(-3),
            Instruction::Halt(HaltReason::InfiniteLoop),
            Instruction::Mod(2),
            Instruction::Output,
        ];
        assert_eq!(interpret(&program, EngineOptions::default()).unwrap(), vec![2]);
    }

    #[test]
    fn counts_executed_instructions() {
        let program = parse("++[>+<-]>.").unwrap();
        let options = EngineOptions::default().with_debug_counters(true);
        let mut interp = Interpreter::new(&program, options).unwrap();
        interp.run_to_end(&mut Vec::new()).unwrap();

        let counters = interp.counters().unwrap();
        assert_eq!(counters.get(InstructionKind::LoopBegin), 1);
        assert_eq!(counters.get(InstructionKind::LoopEnd), 2);
        assert_eq!(counters.get(InstructionKind::Output), 1);
        assert_eq!(counters.get(InstructionKind::Mod), 6);
        assert_eq!(counters.get(InstructionKind::MovePointer), 5);
    }
}
