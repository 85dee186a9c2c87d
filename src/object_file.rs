//! ELF relocatable dump of generated code.
//!
//! The object carries one `.text` section with a global `bf_entry` symbol
//! over the whole routine and a local `bf_op_<i>` label at the start of
//! every instruction, so the output can be inspected with the usual
//! binutils. Host call targets are baked in as absolute addresses of the
//! process that generated the code.

use crate::codegen::{GeneratedCode, TargetArch};
use crate::core::{FatalError, FatalResult};
use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

/// Name of the routine's entry symbol.
pub const ENTRY_SYMBOL: &str = "bf_entry";

/// Name of the label at instruction `ip`.
pub fn op_symbol(ip: usize) -> String {
    format!("bf_op_{}", ip)
}

pub fn write_object(code: &GeneratedCode, arch: TargetArch) -> FatalResult<Vec<u8>> {
    let architecture = match arch {
        TargetArch::X64 => Architecture::X86_64,
        TargetArch::Arm64 => Architecture::Aarch64,
    };
    let mut obj = Object::new(BinaryFormat::Elf, architecture, Endianness::Little);
    let text = obj.section_id(StandardSection::Text);
    let base = obj.append_section_data(text, &code.code, 16);

    obj.add_symbol(Symbol {
        name: ENTRY_SYMBOL.as_bytes().to_vec(),
        value: base,
        size: code.code.len() as u64,
        kind: SymbolKind::Text,
        scope: SymbolScope::Dynamic,
        weak: false,
        section: SymbolSection::Section(text),
        flags: SymbolFlags::None,
    });
    for (ip, &offset) in code.offsets.iter().enumerate() {
        obj.add_symbol(Symbol {
            name: op_symbol(ip).into_bytes(),
            value: base + offset as u64,
            size: 0,
            kind: SymbolKind::Label,
            scope: SymbolScope::Compilation,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
    }

    let bytes = obj
        .write()
        .map_err(|err| FatalError::ObjectFile(err.to_string()))?;
    log::debug!(
        "wrote {:?} object: {} bytes, {} labels",
        arch,
        bytes.len(),
        code.offsets.len()
    );
    Ok(bytes)
}
