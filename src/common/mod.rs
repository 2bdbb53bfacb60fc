//! Common data & logic shared across the compiler
//! (e.g. AST, primitive operators).
pub mod ast;
pub mod primitive;
