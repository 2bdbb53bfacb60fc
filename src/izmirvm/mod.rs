//! Execution engine for compiled Izmir code: routine containers,
//! specialization, a reader for textual listings and the interpreter.

pub mod error;
pub mod interpreter;
pub mod reader;
pub mod routine;

pub use routine::{MutableProgram, MutableRoutine, RoutineName};
