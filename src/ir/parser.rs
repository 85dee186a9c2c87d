//! Source text to IR.
//!
//! Eight bytes are significant: `+ - < > . , [ ]`. Everything else is a
//! comment. A program whose very first byte is `[` starts with a header
//! comment: that one balanced bracket block is dropped before scanning.

use super::Instruction;
use crate::core::{FatalError, FatalResult};

/// Drop the leading header comment, if any.
///
/// Only a `[` at byte 0 opens a header comment; leading whitespace disables
/// the rule. An unterminated header swallows the whole source and emits a
/// diagnostic.
pub fn strip_header_comment(source: &str) -> &str {
    let bytes = source.as_bytes();
    if bytes.first() != Some(&b'[') {
        return source;
    }

    let mut depth = 1u64;
    let mut pos = 1;
    while depth > 0 && pos < bytes.len() {
        match bytes[pos] {
            b'[' => depth += 1,
            b']' => depth -= 1,
            _ => {}
        }
        pos += 1;
    }

    if depth != 0 {
        log::warn!("program starts with a comment but ends before the comment");
    }
    &source[pos..]
}

/// Parse `source` into IR with resolved loop targets.
pub fn parse(source: &str) -> FatalResult<Vec<Instruction>> {
    let body = strip_header_comment(source);
    let base = source.len() - body.len();

    let mut program = Vec::with_capacity(body.len().min(1024 * 1024));
    // (instruction index, byte position) of every open `[`
    let mut open_loops: Vec<(usize, usize)> = Vec::new();

    for (offset, byte) in body.bytes().enumerate() {
        let index = program.len();
        match byte {
            b'+' => program.push(Instruction::Mod(1)),
            b'-' => program.push(Instruction::Mod(255)),
            b'<' => program.push(Instruction::MovePointer(-1)),
            b'>' => program.push(Instruction::MovePointer(1)),
            b'.' => program.push(Instruction::Output),
            b',' => program.push(Instruction::Input),
            b'[' => {
                open_loops.push((index, base + offset));
                program.push(Instruction::LoopBegin(index));
            }
            b']' => {
                let Some((begin, _)) = open_loops.pop() else {
                    return Err(FatalError::UnmatchedLoopEnd {
                        position: base + offset,
                    });
                };
                program.push(Instruction::LoopEnd(begin));
                program[begin] = Instruction::LoopBegin(index);
            }
            _ => {}
        }
    }

    if let Some(&(_, position)) = open_loops.first() {
        return Err(FatalError::UnclosedLoop { position });
    }

    log::debug!("parsed {} instructions from {} bytes", program.len(), source.len());
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Instruction::*;

    #[test]
    fn maps_every_symbol() {
        let program = parse("+-<>.,[]").unwrap();
        assert_eq!(
            program,
            vec![
                Mod(1),
                Mod(255),
                MovePointer(-1),
                MovePointer(1),
                Output,
                Input,
                LoopBegin(7),
                LoopEnd(6),
            ]
        );
    }

    #[test]
    fn ignores_comment_bytes() {
        let program = parse("a+ b\n-ü.").unwrap();
        assert_eq!(program, vec![Mod(1), Mod(255), Output]);
    }

    #[test]
    fn resolves_nested_loops() {
        let program = parse("+[>[-]<]").unwrap();
        assert_eq!(program[1], LoopBegin(7));
        assert_eq!(program[7], LoopEnd(1));
        assert_eq!(program[3], LoopBegin(5));
        assert_eq!(program[5], LoopEnd(3));
    }

    #[test]
    fn rejects_unmatched_loop_end() {
        match parse("+]") {
            Err(FatalError::UnmatchedLoopEnd { position }) => assert_eq!(position, 1),
            other => panic!("expected syntax fault, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unclosed_loop() {
        match parse("+[[]") {
            Err(FatalError::UnclosedLoop { position }) => assert_eq!(position, 1),
            other => panic!("expected syntax fault, got {other:?}"),
        }
    }

    #[test]
    fn strips_leading_header_comment_once() {
        assert_eq!(strip_header_comment("[ a [nested] . ]+."), "+.");
        assert_eq!(parse("[header, with ops . ]+[-]").unwrap().len(), 4);
        // only the first block is a comment
        assert_eq!(strip_header_comment("[x][y]"), "[y]");
    }

    #[test]
    fn leading_whitespace_keeps_the_bracket() {
        assert_eq!(strip_header_comment(" [.]"), " [.]");
        let program = parse(" [.]").unwrap();
        assert_eq!(program, vec![LoopBegin(2), Output, LoopEnd(0)]);
    }

    #[test]
    fn unterminated_header_consumes_everything() {
        assert_eq!(strip_header_comment("[ never closed +++"), "");
        assert!(parse("[ never closed +++").unwrap().is_empty());
    }

    #[test]
    fn error_positions_account_for_the_header() {
        match parse("[hdr]+]") {
            Err(FatalError::UnmatchedLoopEnd { position }) => assert_eq!(position, 6),
            other => panic!("expected syntax fault, got {other:?}"),
        }
    }
}
