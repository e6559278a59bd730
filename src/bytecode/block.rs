use crate::bytecode::Instruction;

/// A maximal straight-line sequence of instructions.
///
/// Blocks produced by [`crate::bytecode::decode_blocks`] are ordered by offset and `id` equals
/// the block's position in that order, so fallthrough from block `i` always enters block `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Position of the block in the method's block list
    pub id: usize,
    /// Byte offset of the first instruction
    pub offset: usize,
    /// Size of the block in bytes
    pub size: usize,
    /// The instructions of this block
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Creates an empty block starting at `offset`.
    #[must_use]
    pub fn new(id: usize, offset: usize) -> Self {
        BasicBlock {
            id,
            offset,
            size: 0,
            instructions: Vec::new(),
        }
    }

    /// Appends an instruction.
    pub fn push(&mut self, instruction: Instruction) {
        self.size += instruction.size;
        self.instructions.push(instruction);
    }

    /// The last instruction of the block.
    #[must_use]
    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Returns `true` if the block has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Offset one past the last byte of the block.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Finds the index of the block starting exactly at `offset`.
#[must_use]
pub fn find_block(blocks: &[BasicBlock], offset: usize) -> Option<usize> {
    blocks.binary_search_by_key(&offset, |block| block.offset).ok()
}
