//! JVM opcode byte constants and the instruction metadata table.
//!
//! Every opcode is available as a constant named after its upper-cased mnemonic (e.g.
//! [`INVOKESTATIC`] = `0xB8`). [`OPCODES`] is indexed by the opcode byte and describes the
//! operand encoding and control flow behaviour the decoder and assembler share.
#![allow(missing_docs)]

use crate::bytecode::{FlowType, OperandType};

pub const NOP: u8 = 0x00;
pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_M1: u8 = 0x02;
pub const ICONST_0: u8 = 0x03;
pub const ICONST_1: u8 = 0x04;
pub const ICONST_2: u8 = 0x05;
pub const ICONST_3: u8 = 0x06;
pub const ICONST_4: u8 = 0x07;
pub const ICONST_5: u8 = 0x08;
pub const LCONST_0: u8 = 0x09;
pub const LCONST_1: u8 = 0x0A;
pub const FCONST_0: u8 = 0x0B;
pub const FCONST_1: u8 = 0x0C;
pub const FCONST_2: u8 = 0x0D;
pub const DCONST_0: u8 = 0x0E;
pub const DCONST_1: u8 = 0x0F;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const LDC2_W: u8 = 0x14;
pub const ILOAD: u8 = 0x15;
pub const LLOAD: u8 = 0x16;
pub const FLOAD: u8 = 0x17;
pub const DLOAD: u8 = 0x18;
pub const ALOAD: u8 = 0x19;
pub const ILOAD_0: u8 = 0x1A;
pub const ILOAD_1: u8 = 0x1B;
pub const ILOAD_2: u8 = 0x1C;
pub const ILOAD_3: u8 = 0x1D;
pub const LLOAD_0: u8 = 0x1E;
pub const LLOAD_1: u8 = 0x1F;
pub const LLOAD_2: u8 = 0x20;
pub const LLOAD_3: u8 = 0x21;
pub const FLOAD_0: u8 = 0x22;
pub const FLOAD_1: u8 = 0x23;
pub const FLOAD_2: u8 = 0x24;
pub const FLOAD_3: u8 = 0x25;
pub const DLOAD_0: u8 = 0x26;
pub const DLOAD_1: u8 = 0x27;
pub const DLOAD_2: u8 = 0x28;
pub const DLOAD_3: u8 = 0x29;
pub const ALOAD_0: u8 = 0x2A;
pub const ALOAD_1: u8 = 0x2B;
pub const ALOAD_2: u8 = 0x2C;
pub const ALOAD_3: u8 = 0x2D;
pub const IALOAD: u8 = 0x2E;
pub const LALOAD: u8 = 0x2F;
pub const FALOAD: u8 = 0x30;
pub const DALOAD: u8 = 0x31;
pub const AALOAD: u8 = 0x32;
pub const BALOAD: u8 = 0x33;
pub const CALOAD: u8 = 0x34;
pub const SALOAD: u8 = 0x35;
pub const ISTORE: u8 = 0x36;
pub const LSTORE: u8 = 0x37;
pub const FSTORE: u8 = 0x38;
pub const DSTORE: u8 = 0x39;
pub const ASTORE: u8 = 0x3A;
pub const ISTORE_0: u8 = 0x3B;
pub const ISTORE_1: u8 = 0x3C;
pub const ISTORE_2: u8 = 0x3D;
pub const ISTORE_3: u8 = 0x3E;
pub const LSTORE_0: u8 = 0x3F;
pub const LSTORE_1: u8 = 0x40;
pub const LSTORE_2: u8 = 0x41;
pub const LSTORE_3: u8 = 0x42;
pub const FSTORE_0: u8 = 0x43;
pub const FSTORE_1: u8 = 0x44;
pub const FSTORE_2: u8 = 0x45;
pub const FSTORE_3: u8 = 0x46;
pub const DSTORE_0: u8 = 0x47;
pub const DSTORE_1: u8 = 0x48;
pub const DSTORE_2: u8 = 0x49;
pub const DSTORE_3: u8 = 0x4A;
pub const ASTORE_0: u8 = 0x4B;
pub const ASTORE_1: u8 = 0x4C;
pub const ASTORE_2: u8 = 0x4D;
pub const ASTORE_3: u8 = 0x4E;
pub const IASTORE: u8 = 0x4F;
pub const LASTORE: u8 = 0x50;
pub const FASTORE: u8 = 0x51;
pub const DASTORE: u8 = 0x52;
pub const AASTORE: u8 = 0x53;
pub const BASTORE: u8 = 0x54;
pub const CASTORE: u8 = 0x55;
pub const SASTORE: u8 = 0x56;
pub const POP: u8 = 0x57;
pub const POP2: u8 = 0x58;
pub const DUP: u8 = 0x59;
pub const DUP_X1: u8 = 0x5A;
pub const DUP_X2: u8 = 0x5B;
pub const DUP2: u8 = 0x5C;
pub const DUP2_X1: u8 = 0x5D;
pub const DUP2_X2: u8 = 0x5E;
pub const SWAP: u8 = 0x5F;
pub const IADD: u8 = 0x60;
pub const LADD: u8 = 0x61;
pub const FADD: u8 = 0x62;
pub const DADD: u8 = 0x63;
pub const ISUB: u8 = 0x64;
pub const LSUB: u8 = 0x65;
pub const FSUB: u8 = 0x66;
pub const DSUB: u8 = 0x67;
pub const IMUL: u8 = 0x68;
pub const LMUL: u8 = 0x69;
pub const FMUL: u8 = 0x6A;
pub const DMUL: u8 = 0x6B;
pub const IDIV: u8 = 0x6C;
pub const LDIV: u8 = 0x6D;
pub const FDIV: u8 = 0x6E;
pub const DDIV: u8 = 0x6F;
pub const IREM: u8 = 0x70;
pub const LREM: u8 = 0x71;
pub const FREM: u8 = 0x72;
pub const DREM: u8 = 0x73;
pub const INEG: u8 = 0x74;
pub const LNEG: u8 = 0x75;
pub const FNEG: u8 = 0x76;
pub const DNEG: u8 = 0x77;
pub const ISHL: u8 = 0x78;
pub const LSHL: u8 = 0x79;
pub const ISHR: u8 = 0x7A;
pub const LSHR: u8 = 0x7B;
pub const IUSHR: u8 = 0x7C;
pub const LUSHR: u8 = 0x7D;
pub const IAND: u8 = 0x7E;
pub const LAND: u8 = 0x7F;
pub const IOR: u8 = 0x80;
pub const LOR: u8 = 0x81;
pub const IXOR: u8 = 0x82;
pub const LXOR: u8 = 0x83;
pub const IINC: u8 = 0x84;
pub const I2L: u8 = 0x85;
pub const I2F: u8 = 0x86;
pub const I2D: u8 = 0x87;
pub const L2I: u8 = 0x88;
pub const L2F: u8 = 0x89;
pub const L2D: u8 = 0x8A;
pub const F2I: u8 = 0x8B;
pub const F2L: u8 = 0x8C;
pub const F2D: u8 = 0x8D;
pub const D2I: u8 = 0x8E;
pub const D2L: u8 = 0x8F;
pub const D2F: u8 = 0x90;
pub const I2B: u8 = 0x91;
pub const I2C: u8 = 0x92;
pub const I2S: u8 = 0x93;
pub const LCMP: u8 = 0x94;
pub const FCMPL: u8 = 0x95;
pub const FCMPG: u8 = 0x96;
pub const DCMPL: u8 = 0x97;
pub const DCMPG: u8 = 0x98;
pub const IFEQ: u8 = 0x99;
pub const IFNE: u8 = 0x9A;
pub const IFLT: u8 = 0x9B;
pub const IFGE: u8 = 0x9C;
pub const IFGT: u8 = 0x9D;
pub const IFLE: u8 = 0x9E;
pub const IF_ICMPEQ: u8 = 0x9F;
pub const IF_ICMPNE: u8 = 0xA0;
pub const IF_ICMPLT: u8 = 0xA1;
pub const IF_ICMPGE: u8 = 0xA2;
pub const IF_ICMPGT: u8 = 0xA3;
pub const IF_ICMPLE: u8 = 0xA4;
pub const IF_ACMPEQ: u8 = 0xA5;
pub const IF_ACMPNE: u8 = 0xA6;
pub const GOTO: u8 = 0xA7;
pub const JSR: u8 = 0xA8;
pub const RET: u8 = 0xA9;
pub const TABLESWITCH: u8 = 0xAA;
pub const LOOKUPSWITCH: u8 = 0xAB;
pub const IRETURN: u8 = 0xAC;
pub const LRETURN: u8 = 0xAD;
pub const FRETURN: u8 = 0xAE;
pub const DRETURN: u8 = 0xAF;
pub const ARETURN: u8 = 0xB0;
pub const RETURN: u8 = 0xB1;
pub const GETSTATIC: u8 = 0xB2;
pub const PUTSTATIC: u8 = 0xB3;
pub const GETFIELD: u8 = 0xB4;
pub const PUTFIELD: u8 = 0xB5;
pub const INVOKEVIRTUAL: u8 = 0xB6;
pub const INVOKESPECIAL: u8 = 0xB7;
pub const INVOKESTATIC: u8 = 0xB8;
pub const INVOKEINTERFACE: u8 = 0xB9;
pub const INVOKEDYNAMIC: u8 = 0xBA;
pub const NEW: u8 = 0xBB;
pub const NEWARRAY: u8 = 0xBC;
pub const ANEWARRAY: u8 = 0xBD;
pub const ARRAYLENGTH: u8 = 0xBE;
pub const ATHROW: u8 = 0xBF;
pub const CHECKCAST: u8 = 0xC0;
pub const INSTANCEOF: u8 = 0xC1;
pub const MONITORENTER: u8 = 0xC2;
pub const MONITOREXIT: u8 = 0xC3;
pub const WIDE: u8 = 0xC4;
pub const MULTIANEWARRAY: u8 = 0xC5;
pub const IFNULL: u8 = 0xC6;
pub const IFNONNULL: u8 = 0xC7;
pub const GOTO_W: u8 = 0xC8;
pub const JSR_W: u8 = 0xC9;

/// Static description of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// The opcode byte
    pub opcode: u8,
    /// Mnemonic as used by `javap`
    pub mnemonic: &'static str,
    /// Operand encoding following the opcode byte
    pub operand: OperandType,
    /// Control flow behaviour
    pub flow: FlowType,
}

macro_rules! info {
    ($opcode:expr, $mnemonic:expr, $operand:ident, $flow:ident) => {
        OpcodeInfo {
            opcode: $opcode,
            mnemonic: $mnemonic,
            operand: OperandType::$operand,
            flow: FlowType::$flow,
        }
    };
}

/// Metadata of all defined opcodes, indexed by opcode byte.
pub static OPCODES: [OpcodeInfo; 202] = [
    info!(0x00, "nop", None, Sequential),
    info!(0x01, "aconst_null", None, Sequential),
    info!(0x02, "iconst_m1", None, Sequential),
    info!(0x03, "iconst_0", None, Sequential),
    info!(0x04, "iconst_1", None, Sequential),
    info!(0x05, "iconst_2", None, Sequential),
    info!(0x06, "iconst_3", None, Sequential),
    info!(0x07, "iconst_4", None, Sequential),
    info!(0x08, "iconst_5", None, Sequential),
    info!(0x09, "lconst_0", None, Sequential),
    info!(0x0A, "lconst_1", None, Sequential),
    info!(0x0B, "fconst_0", None, Sequential),
    info!(0x0C, "fconst_1", None, Sequential),
    info!(0x0D, "fconst_2", None, Sequential),
    info!(0x0E, "dconst_0", None, Sequential),
    info!(0x0F, "dconst_1", None, Sequential),
    info!(0x10, "bipush", Int8, Sequential),
    info!(0x11, "sipush", Int16, Sequential),
    info!(0x12, "ldc", Pool8, Sequential),
    info!(0x13, "ldc_w", Pool16, Sequential),
    info!(0x14, "ldc2_w", Pool16, Sequential),
    info!(0x15, "iload", Local, Sequential),
    info!(0x16, "lload", Local, Sequential),
    info!(0x17, "fload", Local, Sequential),
    info!(0x18, "dload", Local, Sequential),
    info!(0x19, "aload", Local, Sequential),
    info!(0x1A, "iload_0", None, Sequential),
    info!(0x1B, "iload_1", None, Sequential),
    info!(0x1C, "iload_2", None, Sequential),
    info!(0x1D, "iload_3", None, Sequential),
    info!(0x1E, "lload_0", None, Sequential),
    info!(0x1F, "lload_1", None, Sequential),
    info!(0x20, "lload_2", None, Sequential),
    info!(0x21, "lload_3", None, Sequential),
    info!(0x22, "fload_0", None, Sequential),
    info!(0x23, "fload_1", None, Sequential),
    info!(0x24, "fload_2", None, Sequential),
    info!(0x25, "fload_3", None, Sequential),
    info!(0x26, "dload_0", None, Sequential),
    info!(0x27, "dload_1", None, Sequential),
    info!(0x28, "dload_2", None, Sequential),
    info!(0x29, "dload_3", None, Sequential),
    info!(0x2A, "aload_0", None, Sequential),
    info!(0x2B, "aload_1", None, Sequential),
    info!(0x2C, "aload_2", None, Sequential),
    info!(0x2D, "aload_3", None, Sequential),
    info!(0x2E, "iaload", None, Sequential),
    info!(0x2F, "laload", None, Sequential),
    info!(0x30, "faload", None, Sequential),
    info!(0x31, "daload", None, Sequential),
    info!(0x32, "aaload", None, Sequential),
    info!(0x33, "baload", None, Sequential),
    info!(0x34, "caload", None, Sequential),
    info!(0x35, "saload", None, Sequential),
    info!(0x36, "istore", Local, Sequential),
    info!(0x37, "lstore", Local, Sequential),
    info!(0x38, "fstore", Local, Sequential),
    info!(0x39, "dstore", Local, Sequential),
    info!(0x3A, "astore", Local, Sequential),
    info!(0x3B, "istore_0", None, Sequential),
    info!(0x3C, "istore_1", None, Sequential),
    info!(0x3D, "istore_2", None, Sequential),
    info!(0x3E, "istore_3", None, Sequential),
    info!(0x3F, "lstore_0", None, Sequential),
    info!(0x40, "lstore_1", None, Sequential),
    info!(0x41, "lstore_2", None, Sequential),
    info!(0x42, "lstore_3", None, Sequential),
    info!(0x43, "fstore_0", None, Sequential),
    info!(0x44, "fstore_1", None, Sequential),
    info!(0x45, "fstore_2", None, Sequential),
    info!(0x46, "fstore_3", None, Sequential),
    info!(0x47, "dstore_0", None, Sequential),
    info!(0x48, "dstore_1", None, Sequential),
    info!(0x49, "dstore_2", None, Sequential),
    info!(0x4A, "dstore_3", None, Sequential),
    info!(0x4B, "astore_0", None, Sequential),
    info!(0x4C, "astore_1", None, Sequential),
    info!(0x4D, "astore_2", None, Sequential),
    info!(0x4E, "astore_3", None, Sequential),
    info!(0x4F, "iastore", None, Sequential),
    info!(0x50, "lastore", None, Sequential),
    info!(0x51, "fastore", None, Sequential),
    info!(0x52, "dastore", None, Sequential),
    info!(0x53, "aastore", None, Sequential),
    info!(0x54, "bastore", None, Sequential),
    info!(0x55, "castore", None, Sequential),
    info!(0x56, "sastore", None, Sequential),
    info!(0x57, "pop", None, Sequential),
    info!(0x58, "pop2", None, Sequential),
    info!(0x59, "dup", None, Sequential),
    info!(0x5A, "dup_x1", None, Sequential),
    info!(0x5B, "dup_x2", None, Sequential),
    info!(0x5C, "dup2", None, Sequential),
    info!(0x5D, "dup2_x1", None, Sequential),
    info!(0x5E, "dup2_x2", None, Sequential),
    info!(0x5F, "swap", None, Sequential),
    info!(0x60, "iadd", None, Sequential),
    info!(0x61, "ladd", None, Sequential),
    info!(0x62, "fadd", None, Sequential),
    info!(0x63, "dadd", None, Sequential),
    info!(0x64, "isub", None, Sequential),
    info!(0x65, "lsub", None, Sequential),
    info!(0x66, "fsub", None, Sequential),
    info!(0x67, "dsub", None, Sequential),
    info!(0x68, "imul", None, Sequential),
    info!(0x69, "lmul", None, Sequential),
    info!(0x6A, "fmul", None, Sequential),
    info!(0x6B, "dmul", None, Sequential),
    info!(0x6C, "idiv", None, Sequential),
    info!(0x6D, "ldiv", None, Sequential),
    info!(0x6E, "fdiv", None, Sequential),
    info!(0x6F, "ddiv", None, Sequential),
    info!(0x70, "irem", None, Sequential),
    info!(0x71, "lrem", None, Sequential),
    info!(0x72, "frem", None, Sequential),
    info!(0x73, "drem", None, Sequential),
    info!(0x74, "ineg", None, Sequential),
    info!(0x75, "lneg", None, Sequential),
    info!(0x76, "fneg", None, Sequential),
    info!(0x77, "dneg", None, Sequential),
    info!(0x78, "ishl", None, Sequential),
    info!(0x79, "lshl", None, Sequential),
    info!(0x7A, "ishr", None, Sequential),
    info!(0x7B, "lshr", None, Sequential),
    info!(0x7C, "iushr", None, Sequential),
    info!(0x7D, "lushr", None, Sequential),
    info!(0x7E, "iand", None, Sequential),
    info!(0x7F, "land", None, Sequential),
    info!(0x80, "ior", None, Sequential),
    info!(0x81, "lor", None, Sequential),
    info!(0x82, "ixor", None, Sequential),
    info!(0x83, "lxor", None, Sequential),
    info!(0x84, "iinc", Iinc, Sequential),
    info!(0x85, "i2l", None, Sequential),
    info!(0x86, "i2f", None, Sequential),
    info!(0x87, "i2d", None, Sequential),
    info!(0x88, "l2i", None, Sequential),
    info!(0x89, "l2f", None, Sequential),
    info!(0x8A, "l2d", None, Sequential),
    info!(0x8B, "f2i", None, Sequential),
    info!(0x8C, "f2l", None, Sequential),
    info!(0x8D, "f2d", None, Sequential),
    info!(0x8E, "d2i", None, Sequential),
    info!(0x8F, "d2l", None, Sequential),
    info!(0x90, "d2f", None, Sequential),
    info!(0x91, "i2b", None, Sequential),
    info!(0x92, "i2c", None, Sequential),
    info!(0x93, "i2s", None, Sequential),
    info!(0x94, "lcmp", None, Sequential),
    info!(0x95, "fcmpl", None, Sequential),
    info!(0x96, "fcmpg", None, Sequential),
    info!(0x97, "dcmpl", None, Sequential),
    info!(0x98, "dcmpg", None, Sequential),
    info!(0x99, "ifeq", Branch16, ConditionalBranch),
    info!(0x9A, "ifne", Branch16, ConditionalBranch),
    info!(0x9B, "iflt", Branch16, ConditionalBranch),
    info!(0x9C, "ifge", Branch16, ConditionalBranch),
    info!(0x9D, "ifgt", Branch16, ConditionalBranch),
    info!(0x9E, "ifle", Branch16, ConditionalBranch),
    info!(0x9F, "if_icmpeq", Branch16, ConditionalBranch),
    info!(0xA0, "if_icmpne", Branch16, ConditionalBranch),
    info!(0xA1, "if_icmplt", Branch16, ConditionalBranch),
    info!(0xA2, "if_icmpge", Branch16, ConditionalBranch),
    info!(0xA3, "if_icmpgt", Branch16, ConditionalBranch),
    info!(0xA4, "if_icmple", Branch16, ConditionalBranch),
    info!(0xA5, "if_acmpeq", Branch16, ConditionalBranch),
    info!(0xA6, "if_acmpne", Branch16, ConditionalBranch),
    info!(0xA7, "goto", Branch16, UnconditionalBranch),
    info!(0xA8, "jsr", Branch16, Subroutine),
    info!(0xA9, "ret", Local, Subroutine),
    info!(0xAA, "tableswitch", TableSwitch, Switch),
    info!(0xAB, "lookupswitch", LookupSwitch, Switch),
    info!(0xAC, "ireturn", None, Return),
    info!(0xAD, "lreturn", None, Return),
    info!(0xAE, "freturn", None, Return),
    info!(0xAF, "dreturn", None, Return),
    info!(0xB0, "areturn", None, Return),
    info!(0xB1, "return", None, Return),
    info!(0xB2, "getstatic", Pool16, Sequential),
    info!(0xB3, "putstatic", Pool16, Sequential),
    info!(0xB4, "getfield", Pool16, Sequential),
    info!(0xB5, "putfield", Pool16, Sequential),
    info!(0xB6, "invokevirtual", Pool16, Call),
    info!(0xB7, "invokespecial", Pool16, Call),
    info!(0xB8, "invokestatic", Pool16, Call),
    info!(0xB9, "invokeinterface", InvokeInterface, Call),
    info!(0xBA, "invokedynamic", InvokeDynamic, Call),
    info!(0xBB, "new", Pool16, Sequential),
    info!(0xBC, "newarray", ArrayType, Sequential),
    info!(0xBD, "anewarray", Pool16, Sequential),
    info!(0xBE, "arraylength", None, Sequential),
    info!(0xBF, "athrow", None, Throw),
    info!(0xC0, "checkcast", Pool16, Sequential),
    info!(0xC1, "instanceof", Pool16, Sequential),
    info!(0xC2, "monitorenter", None, Sequential),
    info!(0xC3, "monitorexit", None, Sequential),
    info!(0xC4, "wide", Wide, Sequential),
    info!(0xC5, "multianewarray", MultiArray, Sequential),
    info!(0xC6, "ifnull", Branch16, ConditionalBranch),
    info!(0xC7, "ifnonnull", Branch16, ConditionalBranch),
    info!(0xC8, "goto_w", Branch32, UnconditionalBranch),
    info!(0xC9, "jsr_w", Branch32, Subroutine),
];

/// Looks up the metadata of an opcode byte.
#[must_use]
pub fn opcode_info(opcode: u8) -> Option<&'static OpcodeInfo> {
    OPCODES.get(usize::from(opcode))
}

/// Mnemonic of an opcode byte, `"<invalid>"` for undefined bytes.
#[must_use]
pub fn mnemonic(opcode: u8) -> &'static str {
    opcode_info(opcode).map_or("<invalid>", |info| info.mnemonic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_opcode() {
        for (index, info) in OPCODES.iter().enumerate() {
            assert_eq!(usize::from(info.opcode), index, "{}", info.mnemonic);
        }
    }

    #[test]
    fn lookup() {
        assert_eq!(mnemonic(INVOKESTATIC), "invokestatic");
        assert_eq!(mnemonic(0xFE), "<invalid>");
        assert_eq!(opcode_info(GOTO).unwrap().flow, FlowType::UnconditionalBranch);
        assert!(opcode_info(0xCA).is_none());
    }
}
