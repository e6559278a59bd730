//! Label-resolving bytecode assembler.
//!
//! [`BytecodeAssembler`] emits JVM instructions together with the constant pool they reference.
//! Branches name their targets by label; all displacements are patched in [`BytecodeAssembler::finish`].
//! The maximum stack depth is tracked while emitting, using the same stack effect table the
//! reifier's own bookkeeping is checked against.
//!
//! The assembler is how lambda implementation classes are synthesized during a session, and
//! it is the most convenient way to produce method bodies for tests.
//!
//! # Examples
//!
//! ```rust
//! use jreify::bytecode::{opcodes::*, BytecodeAssembler};
//!
//! // static int abs(int x) { return x < 0 ? -x : x; }
//! let mut asm = BytecodeAssembler::new();
//! asm.iload(0)?
//!     .branch(IFGE, "positive")?
//!     .iload(0)?
//!     .op(INEG)?
//!     .op(IRETURN)?
//!     .label("positive")?
//!     .iload(0)?
//!     .op(IRETURN)?;
//!
//! let code = asm.into_code(1)?;
//! assert_eq!(code.max_stack, 1);
//! # Ok::<(), jreify::Error>(())
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{
    bytecode::{decode_instruction, opcodes::*, FlowType, OperandType},
    file::{
        io::{write_be, write_be_at},
        Parser,
    },
    model::{
        Constant, ConstantPool, JType, LambdaBootstrap, MemberRef, MethodCode, MethodDescriptor,
    },
    Error, Result,
};

/// A pending branch displacement.
#[derive(Debug, Clone)]
struct LabelFixup {
    /// Offset of the instruction the displacement is relative to
    instruction: usize,
    /// Offset of the displacement bytes
    position: usize,
    /// Target label
    label: String,
    /// 32 bit displacement (`goto_w`, switch tables)
    wide: bool,
}

/// Assembles one method body.
pub struct BytecodeAssembler {
    code: Vec<u8>,
    pool: ConstantPool,
    labels: FxHashMap<String, usize>,
    fixups: Vec<LabelFixup>,
    label_depth: FxHashMap<String, i32>,
    depth: i32,
    max_depth: i32,
    reachable: bool,
}

impl BytecodeAssembler {
    /// Creates an empty assembler with its own constant pool.
    #[must_use]
    pub fn new() -> Self {
        BytecodeAssembler {
            code: Vec::new(),
            pool: ConstantPool::new(),
            labels: FxHashMap::default(),
            fixups: Vec::new(),
            label_depth: FxHashMap::default(),
            depth: 0,
            max_depth: 0,
            reachable: true,
        }
    }

    /// Current offset in the code array.
    #[must_use]
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Tracked stack depth at the current position.
    #[must_use]
    pub fn stack_depth(&self) -> i32 {
        self.depth
    }

    /// Overrides the tracked stack depth, e.g. at the start of a handler-like region.
    pub fn set_stack_depth(&mut self, depth: i32) {
        self.depth = depth;
        self.max_depth = self.max_depth.max(depth);
        self.reachable = true;
    }

    /// Defines a label at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the label is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.contains_key(name) {
            return Err(malformed_error!("Duplicate label '{}'", name));
        }
        self.labels.insert(name.to_string(), self.code.len());

        if !self.reachable {
            self.depth = self.label_depth.get(name).copied().unwrap_or(0);
            self.reachable = true;
        }
        Ok(self)
    }

    /// Emits an instruction without operands.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `opcode` takes operands or the stack underflows.
    pub fn op(&mut self, opcode: u8) -> Result<&mut Self> {
        match opcode_info(opcode) {
            Some(info) if info.operand == OperandType::None => {
                self.code.push(opcode);
                self.track(self.code.len() - 1)?;
                Ok(self)
            }
            _ => Err(malformed_error!(
                "'{}' can't be emitted without operands",
                mnemonic(opcode)
            )),
        }
    }

    /// Pushes an `int` constant using the shortest encoding.
    ///
    /// # Errors
    /// Returns an error if the constant pool overflows.
    pub fn iconst(&mut self, value: i32) -> Result<&mut Self> {
        let start = self.code.len();
        match value {
            -1..=5 => {
                let short = u8::try_from(value + 3).unwrap_or(ICONST_0);
                self.code.push(short);
            }
            -128..=127 => {
                self.code.push(BIPUSH);
                write_be(&mut self.code, i8::try_from(value).unwrap_or(0));
            }
            -32768..=32767 => {
                self.code.push(SIPUSH);
                write_be(&mut self.code, i16::try_from(value).unwrap_or(0));
            }
            _ => return self.ldc(Constant::Integer(value)),
        }
        self.track(start)?;
        Ok(self)
    }

    /// Pushes a constant from the pool with `ldc`, `ldc_w` or `ldc2_w`.
    ///
    /// # Errors
    /// Returns an error if the constant pool overflows.
    pub fn ldc(&mut self, constant: Constant) -> Result<&mut Self> {
        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        let index = self.pool.intern(constant)?;
        let start = self.code.len();
        if wide {
            self.code.push(LDC2_W);
            write_be(&mut self.code, index);
        } else if let Ok(short) = u8::try_from(index) {
            self.code.push(LDC);
            self.code.push(short);
        } else {
            self.code.push(LDC_W);
            write_be(&mut self.code, index);
        }
        self.track(start)?;
        Ok(self)
    }

    /// Loads a local of the given type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for `void`.
    pub fn load(&mut self, ty: &JType, slot: u16) -> Result<&mut Self> {
        let (base, short) = match ty.stack_type() {
            JType::Int => (ILOAD, ILOAD_0),
            JType::Long => (LLOAD, LLOAD_0),
            JType::Float => (FLOAD, FLOAD_0),
            JType::Double => (DLOAD, DLOAD_0),
            JType::Void => return Err(malformed_error!("Can't load a void local")),
            _ => (ALOAD, ALOAD_0),
        };
        self.local(base, short, slot)
    }

    /// Stores into a local of the given type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for `void`.
    pub fn store(&mut self, ty: &JType, slot: u16) -> Result<&mut Self> {
        let (base, short) = match ty.stack_type() {
            JType::Int => (ISTORE, ISTORE_0),
            JType::Long => (LSTORE, LSTORE_0),
            JType::Float => (FSTORE, FSTORE_0),
            JType::Double => (DSTORE, DSTORE_0),
            JType::Void => return Err(malformed_error!("Can't store a void local")),
            _ => (ASTORE, ASTORE_0),
        };
        self.local(base, short, slot)
    }

    /// Emits the return instruction matching `ty`.
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn return_value(&mut self, ty: &JType) -> Result<&mut Self> {
        let opcode = match ty.stack_type() {
            JType::Void => RETURN,
            JType::Int => IRETURN,
            JType::Long => LRETURN,
            JType::Float => FRETURN,
            JType::Double => DRETURN,
            _ => ARETURN,
        };
        self.op(opcode)
    }

    /// `iload`
    ///
    /// # Errors
    /// Returns an error if emission fails.
    pub fn iload(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(ILOAD, ILOAD_0, slot)
    }

    /// `istore`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn istore(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(ISTORE, ISTORE_0, slot)
    }

    /// `aload`
    ///
    /// # Errors
    /// Returns an error if emission fails.
    pub fn aload(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(ALOAD, ALOAD_0, slot)
    }

    /// `astore`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn astore(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(ASTORE, ASTORE_0, slot)
    }

    /// `iinc`, widened when the slot or increment doesn't fit a byte.
    ///
    /// # Errors
    /// Returns an error if emission fails.
    pub fn iinc(&mut self, slot: u16, delta: i16) -> Result<&mut Self> {
        let start = self.code.len();
        match (u8::try_from(slot), i8::try_from(delta)) {
            (Ok(slot), Ok(delta)) => {
                self.code.extend_from_slice(&[IINC, slot]);
                write_be(&mut self.code, delta);
            }
            _ => {
                self.code.extend_from_slice(&[WIDE, IINC]);
                write_be(&mut self.code, slot);
                write_be(&mut self.code, delta);
            }
        }
        self.track(start)?;
        Ok(self)
    }

    /// Emits a conditional branch or `goto` to `label`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `opcode` is not a 16 bit branch.
    pub fn branch(&mut self, opcode: u8, label: &str) -> Result<&mut Self> {
        match opcode_info(opcode) {
            Some(info) if info.operand == OperandType::Branch16 && opcode != JSR => {}
            _ => {
                return Err(malformed_error!(
                    "'{}' is not a branch instruction",
                    mnemonic(opcode)
                ))
            }
        }

        let start = self.code.len();
        self.code.push(opcode);
        self.fixups.push(LabelFixup {
            instruction: start,
            position: self.code.len(),
            label: label.to_string(),
            wide: false,
        });
        write_be(&mut self.code, 0_i16);
        let depth = self.track(start)?;
        self.record_label(label, depth);
        Ok(self)
    }

    /// `goto label`
    ///
    /// # Errors
    /// Returns an error if emission fails.
    pub fn goto(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(GOTO, label)
    }

    /// Emits a `tableswitch` for the keys `low..low + labels.len()`.
    ///
    /// # Errors
    /// Returns an error if the stack underflows or `labels` is empty.
    pub fn tableswitch(&mut self, low: i32, labels: &[&str], default: &str) -> Result<&mut Self> {
        let count = i32::try_from(labels.len()).map_err(|_| malformed_error!("Switch too large"))?;
        if count == 0 {
            return Err(malformed_error!("tableswitch without cases"));
        }

        let start = self.code.len();
        self.code.push(TABLESWITCH);
        self.pad();
        self.switch_target(start, default);
        write_be(&mut self.code, low);
        write_be(&mut self.code, low + count - 1);
        for label in labels {
            self.switch_target(start, label);
        }
        let depth = self.track(start)?;
        self.record_label(default, depth);
        for label in labels {
            self.record_label(label, depth);
        }
        Ok(self)
    }

    /// Emits a `lookupswitch`; pairs are sorted by key.
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn lookupswitch(&mut self, pairs: &[(i32, &str)], default: &str) -> Result<&mut Self> {
        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|(key, _)| *key);
        let count = i32::try_from(sorted.len()).map_err(|_| malformed_error!("Switch too large"))?;

        let start = self.code.len();
        self.code.push(LOOKUPSWITCH);
        self.pad();
        self.switch_target(start, default);
        write_be(&mut self.code, count);
        for (key, label) in &sorted {
            write_be(&mut self.code, *key);
            self.switch_target(start, label);
        }
        let depth = self.track(start)?;
        self.record_label(default, depth);
        for (_, label) in &sorted {
            self.record_label(label, depth);
        }
        Ok(self)
    }

    /// `getstatic`
    ///
    /// # Errors
    /// Returns an error if the constant pool overflows.
    pub fn getstatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.field_op(GETSTATIC, class, name, descriptor)
    }

    /// `putstatic`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn putstatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.field_op(PUTSTATIC, class, name, descriptor)
    }

    /// `getfield`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn getfield(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.field_op(GETFIELD, class, name, descriptor)
    }

    /// `putfield`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn putfield(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.field_op(PUTFIELD, class, name, descriptor)
    }

    /// `invokestatic`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn invokestatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.invoke(INVOKESTATIC, class, name, descriptor)
    }

    /// `invokevirtual`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn invokevirtual(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<&mut Self> {
        self.invoke(INVOKEVIRTUAL, class, name, descriptor)
    }

    /// `invokespecial`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn invokespecial(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<&mut Self> {
        self.invoke(INVOKESPECIAL, class, name, descriptor)
    }

    /// `invokeinterface`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn invokeinterface(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<&mut Self> {
        self.invoke(INVOKEINTERFACE, class, name, descriptor)
    }

    /// `invokedynamic` with an optional lambda metafactory bootstrap.
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn invokedynamic(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap: Option<LambdaBootstrap>,
    ) -> Result<&mut Self> {
        let index = self.pool.intern(Constant::InvokeDynamic {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            bootstrap,
        })?;
        let start = self.code.len();
        self.code.push(INVOKEDYNAMIC);
        write_be(&mut self.code, index);
        write_be(&mut self.code, 0_u16);
        self.track(start)?;
        Ok(self)
    }

    /// `new`
    ///
    /// # Errors
    /// Returns an error if the constant pool overflows.
    pub fn new_object(&mut self, class: &str) -> Result<&mut Self> {
        self.class_op(NEW, class)
    }

    /// `anewarray`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn anewarray(&mut self, class: &str) -> Result<&mut Self> {
        self.class_op(ANEWARRAY, class)
    }

    /// `checkcast`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn checkcast(&mut self, class: &str) -> Result<&mut Self> {
        self.class_op(CHECKCAST, class)
    }

    /// `instanceof`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn instanceof(&mut self, class: &str) -> Result<&mut Self> {
        self.class_op(INSTANCEOF, class)
    }

    /// `newarray` with a primitive type code (`T_INT` = 10, ...).
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn newarray(&mut self, type_code: u8) -> Result<&mut Self> {
        let start = self.code.len();
        self.code.extend_from_slice(&[NEWARRAY, type_code]);
        self.track(start)?;
        Ok(self)
    }

    /// `multianewarray`
    ///
    /// # Errors
    /// Returns an error if the stack underflows.
    pub fn multianewarray(&mut self, descriptor: &str, dimensions: u8) -> Result<&mut Self> {
        let index = self.pool.intern(Constant::Class(descriptor.to_string()))?;
        let start = self.code.len();
        self.code.push(MULTIANEWARRAY);
        write_be(&mut self.code, index);
        self.code.push(dimensions);
        self.track(start)?;
        Ok(self)
    }

    /// Resolves all labels and returns the code, its maximum stack depth and the pool.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for undefined labels or out of range displacements.
    pub fn finish(mut self) -> Result<(Vec<u8>, u16, ConstantPool)> {
        for fixup in std::mem::take(&mut self.fixups) {
            let Some(&target) = self.labels.get(&fixup.label) else {
                return Err(malformed_error!("Undefined label '{}'", fixup.label));
            };

            let displacement = i64::try_from(target).unwrap_or(i64::MAX)
                - i64::try_from(fixup.instruction).unwrap_or(i64::MAX);
            if fixup.wide {
                let displacement = i32::try_from(displacement)
                    .map_err(|_| malformed_error!("Branch to '{}' out of range", fixup.label))?;
                write_be_at(&mut self.code, fixup.position, displacement)?;
            } else {
                let displacement = i16::try_from(displacement)
                    .map_err(|_| malformed_error!("Branch to '{}' out of range", fixup.label))?;
                write_be_at(&mut self.code, fixup.position, displacement)?;
            }
        }

        let max_stack = u16::try_from(self.max_depth).unwrap_or(u16::MAX);
        Ok((self.code, max_stack, self.pool))
    }

    /// Finishes assembly into a code attribute.
    ///
    /// # Errors
    /// Returns an error if label resolution fails.
    pub fn into_code(self, max_locals: u16) -> Result<MethodCode> {
        let (code, max_stack, pool) = self.finish()?;
        Ok(MethodCode {
            max_stack,
            max_locals,
            code,
            pool: Arc::new(pool),
        })
    }

    fn local(&mut self, base: u8, short: u8, slot: u16) -> Result<&mut Self> {
        let start = self.code.len();
        match u8::try_from(slot) {
            Ok(index) if index < 4 => self.code.push(short + index),
            Ok(index) => self.code.extend_from_slice(&[base, index]),
            Err(_) => {
                self.code.extend_from_slice(&[WIDE, base]);
                write_be(&mut self.code, slot);
            }
        }
        self.track(start)?;
        Ok(self)
    }

    fn field_op(&mut self, opcode: u8, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        let index = self
            .pool
            .intern(Constant::FieldRef(MemberRef::new(class, name, descriptor)))?;
        self.indexed(opcode, index)
    }

    fn invoke(&mut self, opcode: u8, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        let member = MemberRef::new(class, name, descriptor);
        let index = if opcode == INVOKEINTERFACE {
            self.pool.intern(Constant::InterfaceMethodRef(member))?
        } else {
            self.pool.intern(Constant::MethodRef(member))?
        };

        if opcode == INVOKEINTERFACE {
            let slots = MethodDescriptor::parse(descriptor)?.param_slots() + 1;
            let count = u8::try_from(slots).map_err(|_| Error::InvalidDescriptor(descriptor.to_string()))?;
            let start = self.code.len();
            self.code.push(INVOKEINTERFACE);
            write_be(&mut self.code, index);
            self.code.extend_from_slice(&[count, 0]);
            self.track(start)?;
            return Ok(self);
        }
        self.indexed(opcode, index)
    }

    fn class_op(&mut self, opcode: u8, class: &str) -> Result<&mut Self> {
        let index = self.pool.intern(Constant::Class(class.to_string()))?;
        self.indexed(opcode, index)
    }

    fn indexed(&mut self, opcode: u8, index: u16) -> Result<&mut Self> {
        let start = self.code.len();
        self.code.push(opcode);
        write_be(&mut self.code, index);
        self.track(start)?;
        Ok(self)
    }

    fn pad(&mut self) {
        while self.code.len() % 4 != 0 {
            self.code.push(0);
        }
    }

    fn switch_target(&mut self, instruction: usize, label: &str) {
        self.fixups.push(LabelFixup {
            instruction,
            position: self.code.len(),
            label: label.to_string(),
            wide: true,
        });
        write_be(&mut self.code, 0_i32);
    }

    fn record_label(&mut self, label: &str, depth: i32) {
        self.label_depth.entry(label.to_string()).or_insert(depth);
    }

    /// Updates the tracked depth with the instruction emitted at `start` and returns the depth
    /// right after it executed
    fn track(&mut self, start: usize) -> Result<i32> {
        let mut parser = Parser::new(&self.code);
        parser.seek(start)?;
        let instruction = decode_instruction(&mut parser)?;
        let effect = instruction.stack_effect(&self.pool)?;

        let depth = self.depth - i32::from(effect.pops);
        if depth < 0 && self.reachable {
            return Err(malformed_error!(
                "Stack underflow emitting '{}' at offset {}",
                instruction.mnemonic,
                start
            ));
        }
        self.depth = depth.max(0) + i32::from(effect.pushes);
        self.max_depth = self.max_depth.max(self.depth);
        let after = self.depth;

        if instruction.is_terminal() || instruction.flow == FlowType::Subroutine {
            self.reachable = false;
            self.depth = 0;
        }
        Ok(after)
    }
}

impl Default for BytecodeAssembler {
    fn default() -> Self {
        Self::new()
    }
}
