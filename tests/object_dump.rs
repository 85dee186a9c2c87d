use bfjit::codegen::{CodegenOptions, HostCalls, TargetArch};
use bfjit::core::EngineOptions;
use bfjit::ir::{optimize, parse};
use bfjit::object_file::{op_symbol, write_object, ENTRY_SYMBOL};
use object::{File, Object, ObjectSection, ObjectSymbol};

fn dump(source: &str, arch: TargetArch) -> (usize, Vec<usize>, Vec<u8>) {
    let program = optimize(&parse(source).unwrap()).unwrap();
    let options = CodegenOptions::new(
        &EngineOptions::default(),
        HostCalls {
            put_byte: 0x1000,
            out_of_bounds: 0x2000,
        },
    );
    let generated = arch.generate(&program, &options).unwrap();
    let bytes = write_object(&generated, arch).unwrap();
    (program.len(), generated.offsets, bytes)
}

#[test]
fn simple_object() {
    for arch in [TargetArch::X64, TargetArch::Arm64] {
        let (len, offsets, bytes) = dump("++[>+<-]>.", arch);
        let file = File::parse(&*bytes).unwrap();
        assert!(file.section_by_name(".text").is_some());

        let entry = file.symbol_by_name(ENTRY_SYMBOL).unwrap();
        for ip in 0..len {
            let label = file.symbol_by_name(&op_symbol(ip)).unwrap();
            assert_eq!(label.address(), entry.address() + offsets[ip] as u64);
        }
        assert!(file.symbol_by_name(&op_symbol(len)).is_none());
    }
}

#[test]
fn text_holds_the_generated_code() {
    let program = optimize(&parse("+.").unwrap()).unwrap();
    let options = CodegenOptions::new(
        &EngineOptions::default(),
        HostCalls {
            put_byte: 0,
            out_of_bounds: 0,
        },
    );
    let generated = TargetArch::Arm64.generate(&program, &options).unwrap();
    let bytes = write_object(&generated, TargetArch::Arm64).unwrap();
    let file = File::parse(&*bytes).unwrap();
    let text = file.section_by_name(".text").unwrap();
    assert_eq!(text.data().unwrap(), &generated.code[..]);
}
