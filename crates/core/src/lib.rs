//! Domain primitives for the storyreel engine.
//!
//! Pure types and validation shared by every other crate: node statuses and
//! their legal transitions, clip parameter validation, prompt composition
//! and softening, continuation options, and identifier generation. Nothing
//! in this crate performs I/O.

pub mod clip;
pub mod error;
pub mod ids;
pub mod options;
pub mod prompt;
pub mod status;
pub mod types;
