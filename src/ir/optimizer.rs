// This module implements the peephole optimizer. A pass walks the program left to right and
// tries the rewrite rules in priority order at each position: fold a run of Mod instructions,
// fold a run of MovePointer instructions, turn the clear loop `[-]` into SetValue(0) and turn
// an empty loop into Halt(InfiniteLoop). The first matching rule wins and scanning resumes
// after the rewritten span; unmatched instructions are copied through. Passes repeat until one
// changes nothing, then relink_loops restores the LoopBegin/LoopEnd target invariant that the
// rewrites invalidated by shifting positions.

//! Fixed-point peephole optimizer.

use super::{HaltReason, Instruction, InstructionKind};
use crate::core::{EncodingError, FatalResult};

/// Optimize until no rule applies, then relink loop targets.
pub fn optimize(program: &[Instruction]) -> FatalResult<Vec<Instruction>> {
    let mut current = program.to_vec();
    let mut passes = 0usize;
    loop {
        let (next, changed) = optimize_once(&current);
        passes += 1;
        current = next;
        if !changed {
            break;
        }
    }
    relink_loops(&mut current)?;

    log::debug!(
        "optimizer converged after {} passes: {} -> {} instructions",
        passes,
        program.len(),
        current.len()
    );
    Ok(current)
}

/// One left-to-right rewrite pass. Returns the rewritten program and whether
/// any rule fired. Loop targets in the result are stale.
pub fn optimize_once(program: &[Instruction]) -> (Vec<Instruction>, bool) {
    let mut out = Vec::with_capacity(program.len());
    let mut changed = false;
    let mut rest = program;

    while !rest.is_empty() {
        let mods = run_length(rest, InstructionKind::Mod);
        if mods > 1 {
            let sum = rest[..mods].iter().fold(0u8, |acc, inst| match inst {
                Instruction::Mod(delta) => acc.wrapping_add(*delta),
                _ => acc,
            });
            out.push(Instruction::Mod(sum));
            rest = &rest[mods..];
            changed = true;
            continue;
        }

        let moves = run_length(rest, InstructionKind::MovePointer);
        if moves > 1 {
            let sum = rest[..moves].iter().fold(0i64, |acc, inst| match inst {
                Instruction::MovePointer(delta) => acc.wrapping_add(*delta),
                _ => acc,
            });
            out.push(Instruction::MovePointer(sum));
            rest = &rest[moves..];
            changed = true;
            continue;
        }

        if let [Instruction::LoopBegin(_), Instruction::Mod(255), Instruction::LoopEnd(_), ..] = rest {
            out.push(Instruction::SetValue(0));
            rest = &rest[3..];
            changed = true;
            continue;
        }

        if let [Instruction::LoopBegin(_), Instruction::LoopEnd(_), ..] = rest {
            out.push(Instruction::Halt(HaltReason::InfiniteLoop));
            rest = &rest[2..];
            changed = true;
            continue;
        }

        out.push(rest[0]);
        rest = &rest[1..];
    }

    (out, changed)
}

/// Point every `LoopBegin` at its `LoopEnd` and back.
pub fn relink_loops(program: &mut [Instruction]) -> FatalResult<()> {
    let mut open = Vec::new();
    for index in 0..program.len() {
        match program[index] {
            Instruction::LoopBegin(_) => open.push(index),
            Instruction::LoopEnd(_) => {
                let begin = open.pop().ok_or(EncodingError::UnbalancedLoop(index))?;
                program[begin] = Instruction::LoopBegin(index);
                program[index] = Instruction::LoopEnd(begin);
            }
            _ => {}
        }
    }
    match open.first() {
        Some(&begin) => Err(EncodingError::UnbalancedLoop(begin).into()),
        None => Ok(()),
    }
}

fn run_length(program: &[Instruction], kind: InstructionKind) -> usize {
    program
        .iter()
        .take_while(|inst| inst.kind() == kind)
        .count()
}
