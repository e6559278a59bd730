//! Byte-level access to raw method bytecode.
//!
//! Class-file bytecode is stored big-endian. [`Parser`] is a bounds-checked cursor over a
//! method's code array, and [`io`] provides the endian-aware primitive conversions it and the
//! [`crate::bytecode::BytecodeAssembler`] share.

pub mod io;
mod parser;

pub use parser::Parser;
