//! AArch64 architecture-specific components.
//!
//! Translation of IR into an AAPCS64 routine, assembled with dynasmrt.

pub mod codegen;

pub use codegen::Arm64Codegen;
