//! x86-64 architecture-specific components.
//!
//! This module contains all x86-64 specific code:
//! - Instruction encoding using iced-x86
//! - Translation of IR into a System V routine

pub mod codegen;
pub mod encoder;

pub use codegen::X64Codegen;
pub use encoder::{JumpCondition, X64Encoder};
