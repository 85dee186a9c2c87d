//! bfjit - tape-language compiler with native x86-64 and AArch64 backends.
//!
//! Programs are parsed into a flat, loop-linked IR, rewritten by a
//! fixed-point peephole optimizer and then either interpreted or translated
//! to machine code and run in place.
//!
//! # Primary Usage
//!
//! ```no_run
//! use bfjit::core::EngineOptions;
//! use bfjit::engine::JitEngine;
//!
//! let program = bfjit::ir::optimize(&bfjit::ir::parse("++++++++[>++++++++<-]>+.")?)?;
//! let mut engine = JitEngine::new(&program, EngineOptions::default())?;
//! engine.run_to_end(&mut std::io::stdout())?;
//! # Ok::<(), bfjit::core::FatalError>(())
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - IR model, parser, optimizer and printer
//! - [`interpreter`] - reference semantics
//! - [`codegen`] - backend seam shared by [`x64`] and [`arm64`]
//! - [`engine`] - executable memory and native entry
//! - [`core`] - errors, tape, counters, options

pub mod arm64;
pub mod codegen;
pub mod core;
pub mod engine;
pub mod interpreter;
pub mod ir;
pub mod object_file;
pub mod source;
pub mod x64;

pub use crate::codegen::{CodeGenerator, CodegenOptions, GeneratedCode, HostCalls, TargetArch};
pub use crate::core::{
    Cursor, EngineOptions, FatalError, FatalResult, InstructionCounters, Tape,
};
pub use crate::engine::JitEngine;
pub use crate::interpreter::{interpret, Interpreter};
pub use crate::ir::{optimize, parse, Instruction};
