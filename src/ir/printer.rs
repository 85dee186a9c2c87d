//! Indented listing of a program, one instruction per line.

use super::Instruction;
use std::fmt::Write;

/// Render `program` as an indented bracket listing.
///
/// ```
/// let program = bfjit::ir::optimize(&bfjit::ir::parse("++[>-]").unwrap()).unwrap();
/// assert_eq!(
///     bfjit::ir::render(&program),
///     "<+:2>\n<LoopBegin>\n <>:1>\n <-:-1>\n<LoopEnd>\n"
/// );
/// ```
pub fn render(program: &[Instruction]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for inst in program {
        if let Instruction::LoopEnd(_) = inst {
            depth = depth.saturating_sub(1);
        }
        for _ in 0..depth {
            out.push(' ');
        }
        // writing into a String cannot fail
        let _ = match *inst {
            Instruction::Mod(delta) => {
                let signed = delta as i8;
                let sign = if signed < 0 { '-' } else { '+' };
                writeln!(out, "<{}:{}>", sign, signed)
            }
            Instruction::MovePointer(delta) => {
                let sign = if delta < 0 { '<' } else { '>' };
                writeln!(out, "<{}:{}>", sign, delta)
            }
            Instruction::Input => writeln!(out, "<In>"),
            Instruction::Output => writeln!(out, "<Out>"),
            Instruction::LoopBegin(_) => {
                depth += 1;
                writeln!(out, "<LoopBegin>")
            }
            Instruction::LoopEnd(_) => writeln!(out, "<LoopEnd>"),
            Instruction::SetValue(value) => writeln!(out, "<Set:{}>", value),
            Instruction::Halt(_) => writeln!(out, "<Halt>"),
        };
    }
    out
}
