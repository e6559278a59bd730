//! Decoded instruction representation.
//!
//! [`Instruction`] is the unit produced by [`crate::bytecode::decode_instruction`]. Branch and
//! switch operands are already converted to absolute byte offsets so that block partitioning and
//! interpretation never deal with relative displacements.

use crate::{
    bytecode::opcodes::*,
    model::{Constant, ConstantPool, JType, MethodDescriptor},
    Result,
};

/// Operand encoding of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed byte immediate (`bipush`)
    Int8,
    /// Signed short immediate (`sipush`)
    Int16,
    /// Unsigned byte local index, 16 bit under `wide`
    Local,
    /// Unsigned byte constant pool index (`ldc`)
    Pool8,
    /// Unsigned short constant pool index
    Pool16,
    /// Local index and signed increment (`iinc`)
    Iinc,
    /// 16 bit relative branch
    Branch16,
    /// 32 bit relative branch
    Branch32,
    /// Padded `tableswitch` payload
    TableSwitch,
    /// Padded `lookupswitch` payload
    LookupSwitch,
    /// Pool index, argument count and a zero byte
    InvokeInterface,
    /// Pool index and two zero bytes
    InvokeDynamic,
    /// Primitive array type code (`newarray`)
    ArrayType,
    /// Pool index and dimension count (`multianewarray`)
    MultiArray,
    /// `wide` prefix, the operand belongs to the modified instruction
    Wide,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location
    UnconditionalBranch,
    /// Multi-way branch
    Switch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Exception throwing
    Throw,
    /// Legacy subroutine call or return (`jsr`, `ret`)
    Subroutine,
}

/// Decoded operand of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// Immediate integer (`bipush`, `sipush`)
    Immediate(i32),
    /// Local variable slot
    Local(u16),
    /// Constant pool index
    Pool(u16),
    /// `iinc` operands
    Iinc {
        /// Local variable slot
        local: u16,
        /// Signed increment
        delta: i16,
    },
    /// Absolute branch target offset
    Target(usize),
    /// Switch table with absolute target offsets
    Switch {
        /// Target when no case matches
        default: usize,
        /// `(key, target)` pairs in ascending key order
        cases: Vec<(i32, usize)>,
    },
    /// `newarray` primitive type code
    ArrayType(u8),
    /// `multianewarray` operands
    MultiArray {
        /// Constant pool index of the array class
        class: u16,
        /// Number of dimensions popped from the stack
        dimensions: u8,
    },
}

/// Stack effect of an instruction, measured in slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Number of slots popped from stack
    pub pops: u8,
    /// Number of slots pushed to stack
    pub pushes: u8,
}

impl StackBehavior {
    fn new(pops: usize, pushes: usize) -> Self {
        StackBehavior {
            pops: u8::try_from(pops).unwrap_or(u8::MAX),
            pushes: u8::try_from(pushes).unwrap_or(u8::MAX),
        }
    }

    /// Net effect on stack depth (pushes - pops).
    #[must_use]
    pub fn net_effect(&self) -> i16 {
        i16::from(self.pushes) - i16::from(self.pops)
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset of the instruction (of the `wide` prefix, if any)
    pub offset: usize,
    /// Size in bytes, prefix included
    pub size: usize,
    /// Opcode byte, for `wide` forms the modified opcode
    pub opcode: u8,
    /// Mnemonic of the opcode
    pub mnemonic: &'static str,
    /// Control flow behaviour
    pub flow: FlowType,
    /// Decoded operand
    pub operand: Operand,
    /// Decoded from a `wide` prefixed form
    pub wide: bool,
}

impl Instruction {
    /// Offset of the textually next instruction.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }

    /// Absolute offsets this instruction may jump to, fallthrough excluded.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<usize> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch { default, cases } => {
                let mut targets: Vec<usize> = cases.iter().map(|(_, target)| *target).collect();
                targets.push(*default);
                targets
            }
            _ => Vec::new(),
        }
    }

    /// Returns `true` if control never continues with the next instruction.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.flow,
            FlowType::UnconditionalBranch | FlowType::Switch | FlowType::Return | FlowType::Throw
        )
    }

    /// Returns `true` if the instruction ends a basic block.
    #[must_use]
    pub fn ends_block(&self) -> bool {
        self.is_terminal() || self.flow == FlowType::ConditionalBranch
    }

    /// The constant pool index operand, if any.
    #[must_use]
    pub fn pool_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Pool(index) => Some(index),
            Operand::MultiArray { class, .. } => Some(class),
            _ => None,
        }
    }

    /// Computes the stack effect in slots.
    ///
    /// Field and invocation instructions resolve their descriptors through `pool`.
    ///
    /// # Errors
    /// Returns an error if a referenced constant is missing or its descriptor is malformed.
    pub fn stack_effect(&self, pool: &ConstantPool) -> Result<StackBehavior> {
        let effect = match self.opcode {
            NOP | IINC | GOTO | GOTO_W | RET | RETURN => (0, 0),
            ACONST_NULL | ICONST_M1..=ICONST_5 | FCONST_0..=FCONST_2 | BIPUSH | SIPUSH => (0, 1),
            LCONST_0 | LCONST_1 | DCONST_0 | DCONST_1 => (0, 2),
            LDC | LDC_W => (0, 1),
            LDC2_W => (0, 2),
            ILOAD | FLOAD | ALOAD | ILOAD_0..=ILOAD_3 | FLOAD_0..=FLOAD_3 | ALOAD_0..=ALOAD_3 => {
                (0, 1)
            }
            LLOAD | DLOAD | LLOAD_0..=LLOAD_3 | DLOAD_0..=DLOAD_3 => (0, 2),
            IALOAD | FALOAD | AALOAD | BALOAD | CALOAD | SALOAD => (2, 1),
            LALOAD | DALOAD => (2, 2),
            ISTORE | FSTORE | ASTORE | ISTORE_0..=ISTORE_3 | FSTORE_0..=FSTORE_3
            | ASTORE_0..=ASTORE_3 => (1, 0),
            LSTORE | DSTORE | LSTORE_0..=LSTORE_3 | DSTORE_0..=DSTORE_3 => (2, 0),
            IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE => (3, 0),
            LASTORE | DASTORE => (4, 0),
            POP => (1, 0),
            POP2 => (2, 0),
            DUP => (1, 2),
            DUP_X1 => (2, 3),
            DUP_X2 => (3, 4),
            DUP2 => (2, 4),
            DUP2_X1 => (3, 5),
            DUP2_X2 => (4, 6),
            SWAP => (2, 2),
            IADD | FADD | ISUB | FSUB | IMUL | FMUL | IDIV | FDIV | IREM | FREM | ISHL | ISHR
            | IUSHR | IAND | IOR | IXOR => (2, 1),
            LADD | DADD | LSUB | DSUB | LMUL | DMUL | LDIV | DDIV | LREM | DREM | LAND | LOR
            | LXOR => (4, 2),
            LSHL | LSHR | LUSHR => (3, 2),
            INEG | FNEG => (1, 1),
            LNEG | DNEG => (2, 2),
            I2F | F2I | I2B | I2C | I2S => (1, 1),
            I2L | I2D | F2L | F2D => (1, 2),
            L2I | L2F | D2I | D2F => (2, 1),
            L2D | D2L => (2, 2),
            LCMP | DCMPL | DCMPG => (4, 1),
            FCMPL | FCMPG => (2, 1),
            IFEQ..=IFLE | IFNULL | IFNONNULL => (1, 0),
            IF_ICMPEQ..=IF_ACMPNE => (2, 0),
            JSR | JSR_W => (0, 1),
            TABLESWITCH | LOOKUPSWITCH => (1, 0),
            IRETURN | FRETURN | ARETURN => (1, 0),
            LRETURN | DRETURN => (2, 0),
            GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => {
                let index = self.pool_index().unwrap_or(0);
                let width = JType::parse(&pool.field(index)?.descriptor)?.slots();
                match self.opcode {
                    GETSTATIC => (0, width),
                    PUTSTATIC => (width, 0),
                    GETFIELD => (1, width),
                    _ => (1 + width, 0),
                }
            }
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
                let index = self.pool_index().unwrap_or(0);
                let desc = MethodDescriptor::parse(&pool.method(index)?.descriptor)?;
                let receiver = usize::from(self.opcode != INVOKESTATIC);
                (desc.param_slots() + receiver, desc.ret.slots())
            }
            INVOKEDYNAMIC => {
                let index = self.pool_index().unwrap_or(0);
                match pool.get(index)? {
                    Constant::InvokeDynamic { descriptor, .. } => {
                        let desc = MethodDescriptor::parse(descriptor)?;
                        (desc.param_slots(), desc.ret.slots())
                    }
                    other => {
                        return Err(malformed_error!(
                            "invokedynamic references {:?} at offset {}",
                            other,
                            self.offset
                        ))
                    }
                }
            }
            NEW => (0, 1),
            NEWARRAY | ANEWARRAY | ARRAYLENGTH | CHECKCAST | INSTANCEOF => (1, 1),
            ATHROW | MONITORENTER | MONITOREXIT => (1, 0),
            MULTIANEWARRAY => match self.operand {
                Operand::MultiArray { dimensions, .. } => (usize::from(dimensions), 1),
                _ => (0, 1),
            },
            other => {
                return Err(malformed_error!(
                    "No stack effect for opcode 0x{:02X} at offset {}",
                    other,
                    self.offset
                ))
            }
        };

        Ok(StackBehavior::new(effect.0, effect.1))
    }
}
