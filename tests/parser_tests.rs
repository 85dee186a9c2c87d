use bfjit::core::FatalError;
use bfjit::ir::{parse, strip_header_comment, Instruction};

/// Every LoopBegin points at a LoopEnd that points back, with proper nesting.
fn assert_loops_matched(program: &[Instruction]) {
    let mut open = Vec::new();
    for (index, inst) in program.iter().enumerate() {
        match *inst {
            Instruction::LoopBegin(end) => {
                assert_eq!(program[end], Instruction::LoopEnd(index));
                open.push(index);
            }
            Instruction::LoopEnd(begin) => {
                assert_eq!(open.pop(), Some(begin));
                assert_eq!(program[begin], Instruction::LoopBegin(index));
            }
            _ => {}
        }
    }
    assert!(open.is_empty());
}

#[test]
fn loop_targets_form_a_matching() {
    for source in [
        "",
        "[]",
        "+[-]",
        "+[>[+<-]>[-]<]",
        "a[b[c]d[e[f]g]h]i",
        "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.",
    ] {
        let source = format!("+{}", source);
        assert_loops_matched(&parse(&source).unwrap());
    }
}

#[test]
fn unmatched_loop_end_is_rejected() {
    match parse("+.]") {
        Err(FatalError::UnmatchedLoopEnd { position }) => assert_eq!(position, 2),
        other => panic!("expected syntax fault, got {other:?}"),
    }
    assert!(parse("[]]").is_err());
}

#[test]
fn unclosed_loop_is_rejected() {
    assert!(matches!(
        parse("+[[]"),
        Err(FatalError::UnclosedLoop { position: 1 })
    ));
}

#[test]
fn header_comment_only_at_byte_zero() {
    assert_eq!(strip_header_comment("[a [nested] comment]+"), "+");
    assert_eq!(strip_header_comment(" [comment]+"), " [comment]+");
    assert_eq!(strip_header_comment("[unterminated"), "");

    // header text with command characters is ignored
    assert_eq!(parse("[+.,<>]+").unwrap(), vec![Instruction::Mod(1)]);
    // the same block after whitespace is a real loop
    assert_eq!(parse(" [.]").unwrap().len(), 3);
}

#[test]
fn comments_are_ignored() {
    let program = parse("hello + world - <>\n.,").unwrap();
    assert_eq!(
        program,
        vec![
            Instruction::Mod(1),
            Instruction::Mod(255),
            Instruction::MovePointer(-1),
            Instruction::MovePointer(1),
            Instruction::Output,
            Instruction::Input,
        ]
    );
}
