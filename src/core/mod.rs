//! Shared infrastructure used by every stage of the pipeline.
//!
//! - [`error`] - fatal error taxonomy and the encoder error type
//! - [`tape`] - fixed-capacity tape and execution cursor
//! - [`counters`] - per-instruction-kind execution counters
//! - [`options`] - engine configuration

pub mod counters;
pub mod error;
pub mod options;
pub mod tape;

pub use counters::InstructionCounters;
pub use error::{EncodingError, FatalError, FatalResult};
pub use options::EngineOptions;
pub use tape::{Cursor, Tape, DEFAULT_TAPE_CAPACITY, MAX_TAPE_CAPACITY};
