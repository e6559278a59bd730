//! JVM bytecode decoding, partitioning and assembly.
//!
//! This module turns a method's raw code array into the block partition the reifier consumes,
//! and provides the inverse direction for synthesized and test code.
//!
//! # Key Types
//! - [`Instruction`] - A decoded instruction with absolute branch targets
//! - [`BasicBlock`] - A maximal straight-line instruction sequence
//! - [`BytecodeAssembler`] - Label-resolving encoder with its own constant pool
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] - Decode a sequence of instructions
//! - [`decode_blocks`] - Partition a code array into basic blocks
//!
//! # Example
//! ```rust
//! use jreify::bytecode::decode_instruction;
//! use jreify::file::Parser;
//! let bytecode = &[0x00, 0xB1]; // nop, return
//! let mut parser = Parser::new(bytecode);
//! let instruction = decode_instruction(&mut parser)?;
//! println!("Mnemonic: {}", instruction.mnemonic);
//! # Ok::<(), jreify::Error>(())
//! ```

mod assembler;
mod block;
mod decoder;
mod instruction;
pub mod opcodes;
mod visitedmap;

pub use assembler::BytecodeAssembler;
pub use block::{find_block, BasicBlock};
pub use decoder::{decode_blocks, decode_instruction, decode_stream};
pub use instruction::{FlowType, Instruction, Operand, OperandType, StackBehavior};
