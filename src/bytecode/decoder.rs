//! JVM instruction decoding and basic block partitioning.
//!
//! # Example: Decoding a Single Instruction
//!
//! ```rust
//! use jreify::{bytecode::decode_instruction, file::Parser};
//! let code = [0x10, 0xFE]; // bipush -2
//! let mut parser = Parser::new(&code);
//! let instr = decode_instruction(&mut parser)?;
//! assert_eq!(instr.mnemonic, "bipush");
//! assert_eq!(instr.size, 2);
//! # Ok::<(), jreify::Error>(())
//! ```
//!
//! # Example: Partitioning a Method
//!
//! ```rust
//! use jreify::bytecode::decode_blocks;
//! // iload_0; ifeq +5; iconst_1; ireturn; iconst_0; ireturn
//! let code = [0x1A, 0x99, 0x00, 0x05, 0x04, 0xAC, 0x03, 0xAC];
//! let blocks = decode_blocks(&code)?;
//! assert_eq!(blocks.len(), 3);
//! assert_eq!(blocks[2].offset, 6);
//! # Ok::<(), jreify::Error>(())
//! ```

use crate::{
    bytecode::{
        opcodes::*, visitedmap::VisitedMap, BasicBlock, FlowType, Instruction, Operand,
        OperandType,
    },
    file::Parser,
    Result,
};

/// A stateful decoder partitioning one method's code array into basic blocks.
struct Decoder<'a> {
    code: &'a [u8],
    instructions: Vec<Instruction>,
    starts: VisitedMap,
    leaders: VisitedMap,
}

impl<'a> Decoder<'a> {
    fn new(code: &'a [u8]) -> Self {
        Decoder {
            code,
            instructions: Vec::new(),
            starts: VisitedMap::new(code.len()),
            leaders: VisitedMap::new(code.len()),
        }
    }

    /// Linear sweep over the whole code array
    fn decode_all(&mut self) -> Result<()> {
        if self.code.is_empty() {
            return Err(malformed_error!("Empty instruction stream"));
        }

        let mut parser = Parser::new(self.code);
        self.instructions = decode_stream(&mut parser)?;
        for instruction in &self.instructions {
            self.starts.set(instruction.offset, true);
        }

        match self.instructions.last() {
            Some(last) if last.is_terminal() => Ok(()),
            Some(last) => Err(malformed_error!(
                "Control falls off the end of the code after '{}' at offset {}",
                last.mnemonic,
                last.offset
            )),
            None => Err(malformed_error!("Empty instruction stream")),
        }
    }

    /// Marks the entry, every jump target and every instruction following a block terminator
    fn mark_leaders(&mut self) -> Result<()> {
        self.leaders.set(0, true);

        for instruction in &self.instructions {
            for target in instruction.branch_targets() {
                if !self.starts.get(target) {
                    return Err(malformed_error!(
                        "Jump target {} of '{}' at offset {} is not an instruction boundary",
                        target,
                        instruction.mnemonic,
                        instruction.offset
                    ));
                }
                self.leaders.set(target, true);
            }

            if instruction.ends_block() {
                self.leaders.set(instruction.next_offset(), true);
            }
        }

        Ok(())
    }

    fn into_blocks(self) -> Vec<BasicBlock> {
        let mut blocks: Vec<BasicBlock> = Vec::new();
        for instruction in self.instructions {
            let starts_block = self.leaders.get(instruction.offset) || blocks.is_empty();
            if starts_block {
                blocks.push(BasicBlock::new(blocks.len(), instruction.offset));
            }
            if let Some(block) = blocks.last_mut() {
                block.push(instruction);
            }
        }
        blocks
    }
}

/// Decodes a method's code array and partitions it into basic blocks.
///
/// Blocks are maximal straight-line runs: a new block starts at offset 0, at every jump or
/// switch target and after every branch, switch, return or throw. Unreachable code still forms
/// blocks; deciding reachability is left to the consumer.
///
/// # Arguments
/// * `code` - The raw instruction stream
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for undefined opcodes, jumps into the middle of an
/// instruction, empty code or code whose last instruction falls through, and
/// [`crate::Error::OutOfBounds`] for truncated instructions.
pub fn decode_blocks(code: &[u8]) -> Result<Vec<BasicBlock>> {
    let mut decoder = Decoder::new(code);
    decoder.decode_all()?;
    decoder.mark_leaders()?;
    Ok(decoder.into_blocks())
}

/// Decodes instructions linearly until the parser is exhausted.
///
/// # Errors
/// Returns an error if any instruction fails to decode.
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    while parser.has_more_data() {
        instructions.push(decode_instruction(parser)?);
    }
    Ok(instructions)
}

/// Decodes a single instruction at the current parser position.
///
/// Switch padding is computed relative to the start of the parser's data, which must therefore
/// be the start of the method's code array. Relative branch displacements are converted into
/// absolute offsets.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for undefined opcodes, invalid `wide` forms, inverted
/// `tableswitch` ranges and negative branch targets, and [`crate::Error::OutOfBounds`] if the
/// instruction is truncated.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = parser.pos();
    let first = parser.read_be::<u8>()?;

    let (opcode, wide) = if first == WIDE {
        let modified = parser.read_be::<u8>()?;
        match modified {
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET | IINC => (modified, true),
            _ => {
                return Err(malformed_error!(
                    "Invalid wide form 0x{:02X} at offset {}",
                    modified,
                    offset
                ))
            }
        }
    } else {
        (first, false)
    };

    let Some(info) = opcode_info(opcode) else {
        return Err(malformed_error!(
            "Invalid opcode 0x{:02X} at offset {}",
            opcode,
            offset
        ));
    };

    let operand = match info.operand {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(i32::from(parser.read_be::<i8>()?)),
        OperandType::Int16 => Operand::Immediate(i32::from(parser.read_be::<i16>()?)),
        OperandType::Local if wide => Operand::Local(parser.read_be::<u16>()?),
        OperandType::Local => Operand::Local(u16::from(parser.read_be::<u8>()?)),
        OperandType::Pool8 => Operand::Pool(u16::from(parser.read_be::<u8>()?)),
        OperandType::Pool16 => Operand::Pool(parser.read_be::<u16>()?),
        OperandType::Iinc if wide => Operand::Iinc {
            local: parser.read_be::<u16>()?,
            delta: parser.read_be::<i16>()?,
        },
        OperandType::Iinc => Operand::Iinc {
            local: u16::from(parser.read_be::<u8>()?),
            delta: i16::from(parser.read_be::<i8>()?),
        },
        OperandType::Branch16 => {
            Operand::Target(relative(offset, i32::from(parser.read_be::<i16>()?))?)
        }
        OperandType::Branch32 => Operand::Target(relative(offset, parser.read_be::<i32>()?)?),
        OperandType::TableSwitch => {
            parser.align(4)?;
            let default = relative(offset, parser.read_be::<i32>()?)?;
            let low = parser.read_be::<i32>()?;
            let high = parser.read_be::<i32>()?;
            if high < low {
                return Err(malformed_error!(
                    "tableswitch at offset {} has inverted range {}..{}",
                    offset,
                    low,
                    high
                ));
            }

            let mut cases = Vec::new();
            for key in low..=high {
                cases.push((key, relative(offset, parser.read_be::<i32>()?)?));
            }
            Operand::Switch { default, cases }
        }
        OperandType::LookupSwitch => {
            parser.align(4)?;
            let default = relative(offset, parser.read_be::<i32>()?)?;
            let pairs = parser.read_be::<i32>()?;
            if pairs < 0 {
                return Err(malformed_error!(
                    "lookupswitch at offset {} has negative pair count {}",
                    offset,
                    pairs
                ));
            }

            let mut cases = Vec::new();
            for _ in 0..pairs {
                let key = parser.read_be::<i32>()?;
                cases.push((key, relative(offset, parser.read_be::<i32>()?)?));
            }
            Operand::Switch { default, cases }
        }
        OperandType::InvokeInterface => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            Operand::Pool(index)
        }
        OperandType::InvokeDynamic => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            Operand::Pool(index)
        }
        OperandType::ArrayType => Operand::ArrayType(parser.read_be::<u8>()?),
        OperandType::MultiArray => Operand::MultiArray {
            class: parser.read_be::<u16>()?,
            dimensions: parser.read_be::<u8>()?,
        },
        OperandType::Wide => {
            return Err(malformed_error!("Nested wide prefix at offset {}", offset));
        }
    };

    let flow = if opcode == RET && wide {
        FlowType::Subroutine
    } else {
        info.flow
    };

    Ok(Instruction {
        offset,
        size: parser.pos() - offset,
        opcode,
        mnemonic: info.mnemonic,
        flow,
        operand,
        wide,
    })
}

fn relative(offset: usize, delta: i32) -> Result<usize> {
    let base = i64::try_from(offset).map_err(|_| malformed_error!("Offset {} too large", offset))?;
    usize::try_from(base + i64::from(delta))
        .map_err(|_| malformed_error!("Branch at offset {} jumps before the code start", offset))
}
