//! Abstract interpretation of one basic block.
//!
//! The [`BlockTracer`] executes the instructions of a block against an abstract
//! [`FrameState`]: instead of values, the operand stack holds expression trees. Instructions
//! that only compute push larger trees; instructions with effects turn the trees they consume
//! into statements. The result is the statement list of the block plus its exit state.
//!
//! Evaluation order is preserved by spilling: before a statement with effects is appended,
//! every pending non-trivial stack expression is assigned to a temporary, oldest first.

use std::sync::Arc;

use log::{debug, trace};

use crate::{
    ast::{
        BinaryOp, Call, Callee, CondOp, Condition, Expr, FieldAccess, InvokeKind, LValue,
        Literal, NewSite, Stmt, UnaryOp, VarId, VarKind, VarTable, Variable,
    },
    bytecode::{find_block, opcodes::*, BasicBlock, Instruction, Operand},
    model::{ClassOracle, Constant, ConstantPool, JType, MemberRef, MethodDescriptor},
    reify::{
        ids::IdAllocator,
        lambda::LambdaFactory,
        state::{FrameState, Slot},
    },
    Error, Result,
};

const NUMERIC: [JType; 4] = [JType::Int, JType::Long, JType::Float, JType::Double];
const CONDITIONS: [CondOp; 6] = [
    CondOp::Eq,
    CondOp::Ne,
    CondOp::Lt,
    CondOp::Ge,
    CondOp::Gt,
    CondOp::Le,
];

/// Everything the interpretation of one method shares across its blocks.
pub(crate) struct MethodContext<'t> {
    /// Class metadata
    pub classes: &'t dyn ClassOracle,
    /// Class declaring the traced method
    pub owner: String,
    /// Declared return type of the traced method
    pub ret: JType,
    /// Constant pool of the method
    pub pool: Arc<ConstantPool>,
    /// Declared maximum operand stack depth
    pub max_stack: usize,
    /// Variables created so far
    pub vars: VarTable,
    /// Suffixes of temporaries
    pub temps: IdAllocator,
    /// Session-wide allocation site numbering
    pub sites: &'t mut IdAllocator,
    /// Session-wide lambda class synthesis
    pub lambdas: &'t mut LambdaFactory,
}

impl MethodContext<'_> {
    /// Creates a fresh temporary of type `ty`.
    pub fn temp(&mut self, ty: JType) -> VarId {
        let suffix = self.temps.next_id();
        self.vars.push(Variable::new(VarKind::Temp { suffix }, ty))
    }

    /// Assigns `expr` to a fresh temporary, appending the assignment to `out`.
    pub fn spill(&mut self, expr: Expr, out: &mut Vec<Stmt>) -> Expr {
        let ty = expr.ty(&self.vars);
        let temp = self.temp(ty);
        out.push(Stmt::assign(temp, expr));
        Expr::Var(temp)
    }

    /// Returns `true` if `expr` reads a temporary and nothing else.
    pub fn is_temp_read(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Var(var) if self.vars[*var].is_temp())
    }
}

/// Interprets the instructions of one block.
pub(crate) struct BlockTracer<'a, 't> {
    ctx: &'a mut MethodContext<'t>,
    blocks: &'a [BasicBlock],
    state: FrameState,
    stmts: Vec<Stmt>,
    offset: usize,
}

impl<'a, 't> BlockTracer<'a, 't> {
    /// Creates a tracer starting from the entry state of a block.
    pub fn new(ctx: &'a mut MethodContext<'t>, blocks: &'a [BasicBlock], state: FrameState) -> Self {
        BlockTracer {
            ctx,
            blocks,
            state,
            stmts: Vec::new(),
            offset: 0,
        }
    }

    /// Interprets all instructions of `block`, returning its statements and exit state.
    ///
    /// # Errors
    /// Returns [`Error::BadInstructionStream`] if the abstract stack becomes inconsistent and
    /// [`Error::UnsupportedInstruction`] for subroutine instructions.
    pub fn run(mut self, block: &BasicBlock) -> Result<(Vec<Stmt>, FrameState)> {
        for instruction in &block.instructions {
            self.offset = instruction.offset;
            trace!(
                "{:>5}: {:<16} depth {}",
                instruction.offset,
                instruction.mnemonic,
                self.state.depth()
            );
            self.step(instruction)?;
        }
        Ok((self.stmts, self.state))
    }

    fn step(&mut self, instruction: &Instruction) -> Result<()> {
        let opcode = instruction.opcode;
        match opcode {
            NOP => Ok(()),
            ACONST_NULL => self.push(Expr::Literal(Literal::Null), &JType::Null),
            ICONST_M1..=ICONST_5 => {
                self.push_literal(Literal::Int(i32::from(opcode) - i32::from(ICONST_0)))
            }
            LCONST_0 | LCONST_1 => self.push_literal(Literal::Long(i64::from(opcode - LCONST_0))),
            FCONST_0..=FCONST_2 => self.push_literal(Literal::Float(f32::from(opcode - FCONST_0))),
            DCONST_0 | DCONST_1 => {
                self.push_literal(Literal::Double(f64::from(opcode - DCONST_0)))
            }
            BIPUSH | SIPUSH => match instruction.operand {
                Operand::Immediate(value) => self.push_literal(Literal::Int(value)),
                _ => Err(self.bad_operand(instruction)),
            },
            LDC | LDC_W | LDC2_W => self.ldc(self.pool_index(instruction)?),

            ILOAD..=ALOAD => self.load(self.local_operand(instruction)?),
            ILOAD_0..=ALOAD_3 => self.load(u16::from((opcode - ILOAD_0) % 4)),
            ISTORE..=ASTORE => {
                self.store(self.local_operand(instruction)?, store_kind(opcode - ISTORE))
            }
            ISTORE_0..=ASTORE_3 => self.store(
                u16::from((opcode - ISTORE_0) % 4),
                store_kind((opcode - ISTORE_0) / 4),
            ),
            IINC => match instruction.operand {
                Operand::Iinc { local, delta } => self.iinc(local, delta),
                _ => Err(self.bad_operand(instruction)),
            },

            IALOAD..=SALOAD => self.array_load(array_kind(opcode - IALOAD)),
            IASTORE..=SASTORE => self.array_store(array_kind(opcode - IASTORE)),

            POP => self.discard(1),
            POP2 => self.discard(2),
            DUP => self.dup(1, 0),
            DUP_X1 => self.dup(1, 1),
            DUP_X2 => self.dup(1, 2),
            DUP2 => self.dup(2, 0),
            DUP2_X1 => self.dup(2, 1),
            DUP2_X2 => self.dup(2, 2),
            SWAP => self.swap(),

            IADD..=DREM => {
                let ops = [
                    BinaryOp::Add,
                    BinaryOp::Sub,
                    BinaryOp::Mul,
                    BinaryOp::Div,
                    BinaryOp::Rem,
                ];
                let index = usize::from(opcode - IADD);
                self.binary(ops[index / 4], NUMERIC[index % 4].clone())
            }
            INEG..=DNEG => {
                let ty = NUMERIC[usize::from(opcode - INEG)].clone();
                self.unary(UnaryOp::Neg, ty)
            }
            ISHL..=LUSHR => {
                let ops = [BinaryOp::Shl, BinaryOp::Shr, BinaryOp::Ushr];
                let index = usize::from(opcode - ISHL);
                self.binary(ops[index / 2], NUMERIC[index % 2].clone())
            }
            IAND..=LXOR => {
                let ops = [BinaryOp::And, BinaryOp::Or, BinaryOp::Xor];
                let index = usize::from(opcode - IAND);
                self.binary(ops[index / 2], NUMERIC[index % 2].clone())
            }
            I2L..=I2S => {
                let targets = [
                    JType::Long,
                    JType::Float,
                    JType::Double,
                    JType::Int,
                    JType::Float,
                    JType::Double,
                    JType::Int,
                    JType::Long,
                    JType::Double,
                    JType::Int,
                    JType::Long,
                    JType::Float,
                    JType::Byte,
                    JType::Char,
                    JType::Short,
                ];
                self.unary(UnaryOp::Convert, targets[usize::from(opcode - I2L)].clone())
            }
            LCMP => self.binary(BinaryOp::Cmp, JType::Int),
            FCMPL | DCMPL => self.binary(BinaryOp::CmpL, JType::Int),
            FCMPG | DCMPG => self.binary(BinaryOp::CmpG, JType::Int),

            IFEQ..=IFLE => {
                let value = self.pop()?;
                let op = CONDITIONS[usize::from(opcode - IFEQ)];
                let (lhs, rhs) = match value {
                    Expr::Binary {
                        op: BinaryOp::Cmp,
                        lhs,
                        rhs,
                        ..
                    } => (*lhs, *rhs),
                    other => (other, Expr::int(0)),
                };
                self.branch(instruction, op, lhs, rhs)
            }
            IF_ICMPEQ..=IF_ACMPNE => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let op = CONDITIONS[usize::from(opcode - IF_ICMPEQ) % 6];
                self.branch(instruction, op, lhs, rhs)
            }
            IFNULL | IFNONNULL => {
                let value = self.pop()?;
                let op = if opcode == IFNULL {
                    CondOp::Eq
                } else {
                    CondOp::Ne
                };
                self.branch(instruction, op, value, Expr::Literal(Literal::Null))
            }
            GOTO | GOTO_W => {
                let target = self.target(instruction)?;
                self.stmts.push(Stmt::Goto(target));
                Ok(())
            }
            TABLESWITCH | LOOKUPSWITCH => self.switch(instruction),
            JSR | JSR_W | RET => Err(Error::UnsupportedInstruction {
                offset: instruction.offset,
                opcode,
                mnemonic: instruction.mnemonic,
            }),

            IRETURN..=ARETURN => {
                let value = self.pop()?;
                let value = self.truncate_return(value);
                self.emit(Stmt::Return(Some(value)));
                Ok(())
            }
            RETURN => {
                self.emit(Stmt::Return(None));
                Ok(())
            }

            GETSTATIC => self.get_static(self.pool_index(instruction)?),
            PUTSTATIC => {
                let field = self.field_access(self.pool_index(instruction)?, None)?;
                let value = self.pop()?;
                self.emit(Stmt::Assign {
                    target: LValue::Field(field),
                    value,
                });
                Ok(())
            }
            GETFIELD => {
                let object = self.pop()?;
                let field = self.field_access(self.pool_index(instruction)?, Some(object))?;
                let ty = field.ty.clone();
                self.push(Expr::Field(field), &ty)
            }
            PUTFIELD => {
                let value = self.pop()?;
                let object = self.pop()?;
                let field = self.field_access(self.pool_index(instruction)?, Some(object))?;
                self.emit(Stmt::Assign {
                    target: LValue::Field(field),
                    value,
                });
                Ok(())
            }

            INVOKEVIRTUAL => self.invoke(self.pool_index(instruction)?, InvokeKind::Virtual),
            INVOKESPECIAL => self.invoke(self.pool_index(instruction)?, InvokeKind::Special),
            INVOKESTATIC => self.invoke(self.pool_index(instruction)?, InvokeKind::Static),
            INVOKEINTERFACE => self.invoke(self.pool_index(instruction)?, InvokeKind::Interface),
            INVOKEDYNAMIC => self.invoke_dynamic(instruction),

            NEW => {
                let class = self.ctx.pool.class(self.pool_index(instruction)?)?.to_string();
                let site = NewSite(self.ctx.sites.next_id());
                let ty = JType::object(&class);
                self.push(
                    Expr::New {
                        site,
                        class,
                        ctor: None,
                    },
                    &ty,
                )
            }
            NEWARRAY => {
                let Operand::ArrayType(code) = instruction.operand else {
                    return Err(self.bad_operand(instruction));
                };
                let element = primitive_array_type(code).ok_or_else(|| {
                    bad_stream!(self.offset, "invalid newarray type code {}", code)
                })?;
                let count = self.pop()?;
                self.push_array(JType::Array(Box::new(element)), vec![count])
            }
            ANEWARRAY => {
                let class = self.ctx.pool.class(self.pool_index(instruction)?)?;
                let element = JType::from_class_operand(class)?;
                let count = self.pop()?;
                self.push_array(JType::Array(Box::new(element)), vec![count])
            }
            MULTIANEWARRAY => {
                let Operand::MultiArray { class, dimensions } = instruction.operand else {
                    return Err(self.bad_operand(instruction));
                };
                let ty = JType::parse(self.ctx.pool.class(class)?)?;
                let mut dims = Vec::with_capacity(usize::from(dimensions));
                for _ in 0..dimensions {
                    dims.push(self.pop()?);
                }
                dims.reverse();
                self.push_array(ty, dims)
            }
            ARRAYLENGTH => self.unary(UnaryOp::ArrayLength, JType::Int),
            ATHROW => {
                let exception = self.pop()?;
                self.emit(Stmt::Throw(exception));
                Ok(())
            }
            CHECKCAST => {
                let ty = JType::from_class_operand(
                    self.ctx.pool.class(self.pool_index(instruction)?)?,
                )?;
                self.unary(UnaryOp::CheckCast(ty.clone()), ty)
            }
            INSTANCEOF => {
                let ty = JType::from_class_operand(
                    self.ctx.pool.class(self.pool_index(instruction)?)?,
                )?;
                self.unary(UnaryOp::InstanceOf(ty), JType::Int)
            }
            MONITORENTER => {
                let object = self.pop()?;
                self.emit(Stmt::MonitorEnter(object));
                Ok(())
            }
            MONITOREXIT => {
                let object = self.pop()?;
                self.emit(Stmt::MonitorExit(object));
                Ok(())
            }
            _ => Err(Error::UnsupportedInstruction {
                offset: instruction.offset,
                opcode,
                mnemonic: instruction.mnemonic,
            }),
        }
    }

    fn underflow(&self) -> Error {
        bad_stream!(self.offset, "operand stack underflow")
    }

    fn bad_operand(&self, instruction: &Instruction) -> Error {
        bad_stream!(
            self.offset,
            "unexpected operand {:?} for {}",
            instruction.operand,
            instruction.mnemonic
        )
    }

    fn pool_index(&self, instruction: &Instruction) -> Result<u16> {
        instruction
            .pool_index()
            .ok_or_else(|| self.bad_operand(instruction))
    }

    fn local_operand(&self, instruction: &Instruction) -> Result<u16> {
        match instruction.operand {
            Operand::Local(slot) => Ok(slot),
            _ => Err(self.bad_operand(instruction)),
        }
    }

    fn target(&self, instruction: &Instruction) -> Result<usize> {
        match instruction.operand {
            Operand::Target(offset) => self.block_at(offset),
            _ => Err(self.bad_operand(instruction)),
        }
    }

    fn block_at(&self, offset: usize) -> Result<usize> {
        find_block(self.blocks, offset)
            .ok_or_else(|| bad_stream!(self.offset, "jump to {} is not a block start", offset))
    }

    fn push(&mut self, expr: Expr, ty: &JType) -> Result<()> {
        let width = ty.slots().max(1);
        if self.state.depth() + width > self.ctx.max_stack {
            return Err(bad_stream!(
                self.offset,
                "operand stack overflow, max depth is {}",
                self.ctx.max_stack
            ));
        }
        self.state.stack.push(Slot::Value(expr));
        if width == 2 {
            self.state.stack.push(Slot::Empty);
        }
        Ok(())
    }

    fn push_literal(&mut self, literal: Literal) -> Result<()> {
        let ty = literal.ty();
        self.push(Expr::Literal(literal), &ty)
    }

    fn push_array(&mut self, ty: JType, dims: Vec<Expr>) -> Result<()> {
        self.push(
            Expr::NewArray {
                ty: ty.clone(),
                dims,
            },
            &ty,
        )
    }

    /// Pops one value, consuming both slots of a 64-bit value.
    fn pop(&mut self) -> Result<Expr> {
        match self.state.stack.pop() {
            Some(Slot::Value(expr)) => Ok(expr),
            Some(Slot::Empty) => match self.state.stack.pop() {
                Some(Slot::Value(expr)) => Ok(expr),
                Some(Slot::Empty) => Err(bad_stream!(
                    self.offset,
                    "64-bit value split across stack slots"
                )),
                None => Err(self.underflow()),
            },
            None => Err(self.underflow()),
        }
    }

    /// Spills every pending non-trivial stack value, oldest first.
    fn spill_pending(&mut self) {
        self.spill_where(|expr| !expr.is_trivial() && !expr.is_new_marker());
    }

    /// Spills every stack value that reads `var`.
    fn spill_reads_of(&mut self, var: VarId) {
        self.spill_where(|expr| expr.uses_var(var));
    }

    fn spill_where(&mut self, predicate: impl Fn(&Expr) -> bool) {
        for index in 0..self.state.stack.len() {
            let spill = match &self.state.stack[index] {
                Slot::Value(expr) => predicate(expr),
                Slot::Empty => false,
            };
            if !spill {
                continue;
            }
            if let Slot::Value(expr) = std::mem::replace(&mut self.state.stack[index], Slot::Empty) {
                let temp = self.ctx.spill(expr, &mut self.stmts);
                self.state.stack[index] = Slot::Value(temp);
            }
        }
    }

    /// Appends a statement with effects after spilling pending stack values.
    fn emit(&mut self, stmt: Stmt) {
        self.spill_pending();
        self.stmts.push(stmt);
    }

    fn ldc(&mut self, index: u16) -> Result<()> {
        let literal = match self.ctx.pool.get(index)? {
            Constant::Integer(value) => Literal::Int(*value),
            Constant::Float(value) => Literal::Float(*value),
            Constant::Long(value) => Literal::Long(*value),
            Constant::Double(value) => Literal::Double(*value),
            Constant::String(value) => Literal::String(value.clone()),
            Constant::Class(name) => Literal::Class(name.clone()),
            other => {
                return Err(bad_stream!(
                    self.offset,
                    "ldc of non-loadable constant {:?}",
                    other
                ))
            }
        };
        self.push_literal(literal)
    }

    fn load(&mut self, slot: u16) -> Result<()> {
        let var = self
            .state
            .locals
            .get(usize::from(slot))
            .copied()
            .flatten()
            .ok_or_else(|| bad_stream!(self.offset, "read of undefined local {}", slot))?;
        let ty = self.ctx.vars[var].ty.clone();
        self.push(Expr::Var(var), &ty)
    }

    fn store(&mut self, slot: u16, kind: JType) -> Result<()> {
        let value = self.pop()?;
        let index = usize::from(slot);
        if index + kind.slots() > self.state.locals.len() {
            return Err(bad_stream!(self.offset, "store to local {} out of range", slot));
        }

        if let Some(previous) = self.state.locals[index] {
            self.spill_reads_of(previous);
        }
        if value.has_side_effects() {
            self.spill_pending();
        }

        let value_ty = value.ty(&self.ctx.vars);
        let ty = if value_ty.stack_type() == kind.stack_type()
            || (kind.is_reference() && value_ty.is_reference())
        {
            value_ty
        } else {
            kind
        };
        let wide = ty.is_wide();
        let mut var = Variable::new(VarKind::Local { slot }, ty);
        if matches!(value, Expr::Literal(_) | Expr::New { .. }) {
            var.value = Some(value.clone());
        }
        let var = self.ctx.vars.push(var);
        self.stmts.push(Stmt::assign(var, value));
        self.bind_local(index, var, wide);
        Ok(())
    }

    fn bind_local(&mut self, index: usize, var: VarId, wide: bool) {
        if index > 0 {
            if let Some(previous) = self.state.locals[index - 1] {
                if self.ctx.vars[previous].ty.is_wide() {
                    self.state.locals[index - 1] = None;
                }
            }
        }
        self.state.locals[index] = Some(var);
        if wide {
            if let Some(upper) = self.state.locals.get_mut(index + 1) {
                *upper = None;
            }
        }
    }

    fn iinc(&mut self, slot: u16, delta: i16) -> Result<()> {
        let index = usize::from(slot);
        let current = self
            .state
            .locals
            .get(index)
            .copied()
            .flatten()
            .ok_or_else(|| bad_stream!(self.offset, "iinc of undefined local {}", slot))?;
        self.spill_reads_of(current);

        let ty = self.ctx.vars[current].ty.clone();
        let var = self
            .ctx
            .vars
            .push(Variable::new(VarKind::Local { slot }, ty.clone()));
        self.stmts.push(Stmt::assign(
            var,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Var(current)),
                rhs: Box::new(Expr::int(i32::from(delta))),
                ty,
            },
        ));
        self.bind_local(index, var, false);
        Ok(())
    }

    fn array_load(&mut self, fallback: JType) -> Result<()> {
        let index = self.pop()?;
        let array = self.pop()?;
        let ty = element_type(&array.ty(&self.ctx.vars), fallback);
        self.push(
            Expr::ArrayElem {
                array: Box::new(array),
                index: Box::new(index),
                ty: ty.clone(),
            },
            &ty,
        )
    }

    fn array_store(&mut self, fallback: JType) -> Result<()> {
        let value = self.pop()?;
        let index = self.pop()?;
        let array = self.pop()?;
        let ty = element_type(&array.ty(&self.ctx.vars), fallback);
        self.emit(Stmt::Assign {
            target: LValue::ArrayElem { array, index, ty },
            value,
        });
        Ok(())
    }

    fn discard(&mut self, slots: usize) -> Result<()> {
        for _ in 0..slots {
            match self.state.stack.pop() {
                Some(Slot::Value(expr)) if expr.has_side_effects() => {
                    self.emit(Stmt::Eval(expr));
                }
                Some(_) => {}
                None => return Err(self.underflow()),
            }
        }
        Ok(())
    }

    /// Duplicates the top `count` slots and inserts the copies `depth` slots further down.
    fn dup(&mut self, count: usize, depth: usize) -> Result<()> {
        let len = self.state.depth();
        if len < count + depth {
            return Err(self.underflow());
        }
        if len + count > self.ctx.max_stack {
            return Err(bad_stream!(
                self.offset,
                "operand stack overflow, max depth is {}",
                self.ctx.max_stack
            ));
        }

        let copied = len - count..len;
        let needs_spill = self.state.stack[copied.clone()]
            .iter()
            .any(|slot| matches!(slot, Slot::Value(e) if !e.is_trivial() && !e.is_new_marker()));
        if needs_spill {
            self.spill_pending();
        }

        let copies: Vec<Slot> = self.state.stack[copied].to_vec();
        let at = len - count - depth;
        for (offset, slot) in copies.into_iter().enumerate() {
            self.state.stack.insert(at + offset, slot);
        }
        Ok(())
    }

    fn swap(&mut self) -> Result<()> {
        let len = self.state.depth();
        if len < 2 {
            return Err(self.underflow());
        }
        if self.state.stack[len - 2..]
            .iter()
            .any(|slot| matches!(slot, Slot::Value(e) if !e.is_trivial()))
        {
            self.spill_pending();
        }
        self.state.stack.swap(len - 1, len - 2);
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp, ty: JType) -> Result<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.push(
            Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                ty: ty.clone(),
            },
            &ty,
        )
    }

    fn unary(&mut self, op: UnaryOp, ty: JType) -> Result<()> {
        let operand = self.pop()?;
        self.push(
            Expr::Unary {
                op,
                operand: Box::new(operand),
                ty: ty.clone(),
            },
            &ty,
        )
    }

    fn branch(&mut self, instruction: &Instruction, op: CondOp, lhs: Expr, rhs: Expr) -> Result<()> {
        let target = self.target(instruction)?;
        self.emit(Stmt::Branch {
            cond: Condition { op, lhs, rhs },
            target,
        });
        Ok(())
    }

    fn switch(&mut self, instruction: &Instruction) -> Result<()> {
        let Operand::Switch { default, cases } = &instruction.operand else {
            return Err(self.bad_operand(instruction));
        };
        let default = self.block_at(*default)?;
        let cases = cases
            .iter()
            .map(|(key, offset)| Ok((*key, self.block_at(*offset)?)))
            .collect::<Result<Vec<_>>>()?;
        let key = self.pop()?;
        self.emit(Stmt::Switch {
            key,
            cases,
            default,
        });
        Ok(())
    }

    fn truncate_return(&self, value: Expr) -> Expr {
        let ret = &self.ctx.ret;
        let narrow = matches!(
            ret,
            JType::Boolean | JType::Byte | JType::Char | JType::Short
        );
        if narrow && value.ty(&self.ctx.vars) != *ret {
            Expr::Unary {
                op: UnaryOp::Convert,
                operand: Box::new(value),
                ty: ret.clone(),
            }
        } else {
            value
        }
    }

    fn field_access(&self, index: u16, target: Option<Expr>) -> Result<FieldAccess> {
        let field = self.ctx.pool.field(index)?;
        Ok(FieldAccess {
            owner: field.class.clone(),
            name: field.name.clone(),
            ty: JType::parse(&field.descriptor)?,
            target: target.map(Box::new),
        })
    }

    fn get_static(&mut self, index: u16) -> Result<()> {
        let field = self.field_access(index, None)?;
        let ty = field.ty.clone();
        let constant = match self.ctx.classes.resolve_field(&field.owner, &field.name) {
            Ok(resolved) => {
                let info = resolved.field();
                if info.is_static() && info.is_final() {
                    info.constant.clone()
                } else {
                    None
                }
            }
            Err(err) => {
                debug!(
                    "{}: static read of {}.{} stays unresolved: {}",
                    self.offset, field.owner, field.name, err
                );
                None
            }
        };
        match constant {
            Some(literal) => self.push(Expr::Literal(literal), &ty),
            None => self.push(Expr::Field(field), &ty),
        }
    }

    fn pop_args(&mut self, descriptor: &MethodDescriptor) -> Result<Vec<Expr>> {
        let mut args = Vec::with_capacity(descriptor.params.len());
        for _ in &descriptor.params {
            args.push(self.pop()?);
        }
        args.reverse();
        Ok(args)
    }

    fn invoke(&mut self, index: u16, kind: InvokeKind) -> Result<()> {
        let method = self.ctx.pool.method(index)?.clone();
        let descriptor = MethodDescriptor::parse(&method.descriptor)?;
        let args = self.pop_args(&descriptor)?;
        let receiver = match kind {
            InvokeKind::Static => None,
            _ => Some(self.pop()?),
        };

        let receiver = match receiver {
            Some(Expr::New {
                site,
                class,
                ctor: None,
            }) if kind == InvokeKind::Special && method.is_constructor() => {
                return self.construct(site, class, method, args);
            }
            other => other,
        };

        let call = Expr::Call(Box::new(Call {
            method,
            kind,
            receiver,
            args,
            ret: descriptor.ret.clone(),
            callee: Callee::Unresolved,
        }));
        if descriptor.ret == JType::Void {
            self.emit(Stmt::Eval(call));
            Ok(())
        } else {
            self.spill_pending();
            self.push(call, &descriptor.ret)
        }
    }

    /// Folds a constructor call into the construction marker(s) of `site`.
    fn construct(
        &mut self,
        site: NewSite,
        class: String,
        method: MemberRef,
        args: Vec<Expr>,
    ) -> Result<()> {
        self.spill_pending();
        let constructed = Expr::New {
            site,
            class,
            ctor: Some(Box::new(Call {
                method,
                kind: InvokeKind::Special,
                receiver: None,
                args,
                ret: JType::Void,
                callee: Callee::Unresolved,
            })),
        };

        let copies: Vec<usize> = self
            .state
            .stack
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                matches!(slot, Slot::Value(Expr::New { site: other, ctor: None, .. }) if *other == site)
            })
            .map(|(index, _)| index)
            .collect();

        match copies.as_slice() {
            [] => self.stmts.push(Stmt::Eval(constructed)),
            [single] => self.state.stack[*single] = Slot::Value(constructed),
            several => {
                let temp = self.ctx.spill(constructed, &mut self.stmts);
                for index in several {
                    self.state.stack[*index] = Slot::Value(temp.clone());
                }
            }
        }
        Ok(())
    }

    fn invoke_dynamic(&mut self, instruction: &Instruction) -> Result<()> {
        let index = self.pool_index(instruction)?;
        let Constant::InvokeDynamic {
            name,
            descriptor,
            bootstrap,
        } = self.ctx.pool.get(index)?.clone()
        else {
            return Err(self.bad_operand(instruction));
        };
        let Some(bootstrap) = bootstrap else {
            return Err(Error::UnsupportedInstruction {
                offset: instruction.offset,
                opcode: instruction.opcode,
                mnemonic: instruction.mnemonic,
            });
        };

        let site_descriptor = MethodDescriptor::parse(&descriptor)?;
        let owner = self.ctx.owner.clone();
        let class = self
            .ctx
            .lambdas
            .synthesize(&owner, &name, &descriptor, &bootstrap)?;
        let captured = self.pop_args(&site_descriptor)?;
        self.spill_pending();

        let ctor_descriptor = MethodDescriptor {
            params: site_descriptor.params.clone(),
            ret: JType::Void,
        };
        let site = NewSite(self.ctx.sites.next_id());
        let ty = JType::object(&class);
        let ctor = Call {
            method: MemberRef::new(&class, "<init>", &ctor_descriptor.descriptor()),
            kind: InvokeKind::Special,
            receiver: None,
            args: captured,
            ret: JType::Void,
            callee: Callee::Unresolved,
        };
        self.push(
            Expr::New {
                site,
                class,
                ctor: Some(Box::new(ctor)),
            },
            &ty,
        )
    }
}

/// Kind of a typed load or store, in `i l f d a` order.
fn store_kind(index: u8) -> JType {
    match index {
        0 => JType::Int,
        1 => JType::Long,
        2 => JType::Float,
        3 => JType::Double,
        _ => JType::object(crate::model::OBJECT_CLASS),
    }
}

/// Element kind of an array instruction, in `i l f d a b c s` order.
fn array_kind(index: u8) -> JType {
    match index {
        0 => JType::Int,
        1 => JType::Long,
        2 => JType::Float,
        3 => JType::Double,
        5 => JType::Byte,
        6 => JType::Char,
        7 => JType::Short,
        _ => JType::object(crate::model::OBJECT_CLASS),
    }
}

fn element_type(array: &JType, fallback: JType) -> JType {
    match array.element() {
        Some(element) if element.stack_type() == fallback.stack_type() => element.clone(),
        Some(element) if element.is_reference() && fallback.is_reference() => element.clone(),
        _ => fallback,
    }
}

fn primitive_array_type(code: u8) -> Option<JType> {
    Some(match code {
        4 => JType::Boolean,
        5 => JType::Char,
        6 => JType::Float,
        7 => JType::Double,
        8 => JType::Byte,
        9 => JType::Short,
        10 => JType::Int,
        11 => JType::Long,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::decode_blocks,
        model::{ClassPath, MethodCode},
        test::assemble,
    };

    /// Interprets the first block of `code` with `params` int parameters in the leading slots.
    fn interpret(code: &MethodCode, params: u16) -> Result<(Vec<Stmt>, VarTable)> {
        let classes = ClassPath::new();
        let mut sites = IdAllocator::new();
        let mut lambdas = LambdaFactory::new();
        let mut ctx = MethodContext {
            classes: &classes,
            owner: "demo/A".to_string(),
            ret: JType::Int,
            pool: code.pool.clone(),
            max_stack: usize::from(code.max_stack),
            vars: VarTable::new(),
            temps: IdAllocator::new(),
            sites: &mut sites,
            lambdas: &mut lambdas,
        };
        let mut state = FrameState::new(usize::from(code.max_locals));
        for slot in 0..params {
            let kind = VarKind::Param {
                role: crate::ast::FormalRole::Index(slot),
                slot,
            };
            state.locals[usize::from(slot)] = Some(ctx.vars.push(Variable::new(kind, JType::Int)));
        }

        let blocks = decode_blocks(&code.code)?;
        let (stmts, _) = BlockTracer::new(&mut ctx, &blocks, state).run(&blocks[0])?;
        Ok((stmts, ctx.vars))
    }

    /// Interprets the first `len` instructions of the first block and returns the exit depth.
    fn depth_after(code: &MethodCode, params: u16, len: usize) -> usize {
        let classes = ClassPath::new();
        let mut sites = IdAllocator::new();
        let mut lambdas = LambdaFactory::new();
        let mut ctx = MethodContext {
            classes: &classes,
            owner: "demo/A".to_string(),
            ret: JType::Int,
            pool: code.pool.clone(),
            max_stack: usize::from(code.max_stack),
            vars: VarTable::new(),
            temps: IdAllocator::new(),
            sites: &mut sites,
            lambdas: &mut lambdas,
        };
        let mut state = FrameState::new(usize::from(code.max_locals));
        for slot in 0..params {
            let kind = VarKind::Param {
                role: crate::ast::FormalRole::Index(slot),
                slot,
            };
            state.locals[usize::from(slot)] = Some(ctx.vars.push(Variable::new(kind, JType::Int)));
        }

        let blocks = decode_blocks(&code.code).unwrap();
        let prefix = BasicBlock {
            instructions: blocks[0].instructions[..len].to_vec(),
            ..blocks[0].clone()
        };
        let (_, exit) = BlockTracer::new(&mut ctx, &blocks, state).run(&prefix).unwrap();
        exit.depth()
    }

    /// Checks the abstract depth after every prefix of the first block against the summed
    /// declared stack effects.
    fn assert_stack_balance(code: &MethodCode, params: u16) {
        let blocks = decode_blocks(&code.code).unwrap();
        assert_eq!(blocks.len(), 1);
        let mut expected: i32 = 0;
        for (index, instruction) in blocks[0].instructions.iter().enumerate() {
            expected += i32::from(instruction.stack_effect(&code.pool).unwrap().net_effect());
            let actual = depth_after(code, params, index + 1);
            assert_eq!(
                actual as i32, expected,
                "depth after {} at offset {}",
                instruction.mnemonic, instruction.offset
            );
        }
    }

    #[test]
    fn stack_balance_with_wide_values_calls_and_allocation() {
        let code = assemble(1, |asm| {
            asm.iload(0)?
                .op(DUP)?
                .op(IMUL)?
                .op(LCONST_1)?
                .op(DUP2)?
                .op(LADD)?
                .op(L2I)?
                .op(IADD)?
                .invokestatic("demo/A", "g", "(I)J")?
                .op(POP2)?
                .new_object("demo/A")?
                .op(DUP)?
                .invokespecial("demo/A", "<init>", "()V")?
                .op(POP)?
                .iconst(2)?
                .op(IRETURN)?;
            Ok(())
        });
        assert_stack_balance(&code, 1);
    }

    #[test]
    fn stack_balance_with_wide_locals_and_shuffles() {
        let code = assemble(3, |asm| {
            asm.op(LCONST_1)?
                .store(&JType::Long, 1)?
                .iload(0)?
                .iconst(3)?
                .op(DUP_X1)?
                .op(POP)?
                .op(SWAP)?
                .op(POP)?
                .load(&JType::Long, 1)?
                .op(L2I)?
                .op(IADD)?
                .op(IRETURN)?;
            Ok(())
        });
        assert_stack_balance(&code, 1);
    }

    #[test]
    fn call_result_is_spilled_before_later_effects() {
        let code = assemble(0, |asm| {
            asm.invokestatic("demo/A", "g", "()I")?
                .invokestatic("demo/A", "h", "()V")?
                .op(IRETURN)?;
            Ok(())
        });

        let (stmts, vars) = interpret(&code, 0).unwrap();
        match stmts.as_slice() {
            [Stmt::Assign {
                target: LValue::Var(temp),
                value: Expr::Call(first),
            }, Stmt::Eval(Expr::Call(second)), Stmt::Return(Some(Expr::Var(returned)))] => {
                assert!(vars[*temp].is_temp());
                assert_eq!(temp, returned);
                assert_eq!(first.method.name, "g");
                assert_eq!(second.method.name, "h");
            }
            other => panic!("unexpected statements {other:?}"),
        }
    }

    #[test]
    fn iinc_assigns_sum_to_fresh_local() {
        let code = assemble(1, |asm| {
            asm.iinc(0, 3)?.iload(0)?.op(IRETURN)?;
            Ok(())
        });

        let (stmts, vars) = interpret(&code, 1).unwrap();
        assert_eq!(vars.len(), 2);
        match stmts.as_slice() {
            [Stmt::Assign {
                target: LValue::Var(local),
                value: Expr::Binary { op: BinaryOp::Add, lhs, rhs, .. },
            }, Stmt::Return(Some(Expr::Var(returned)))] => {
                assert_eq!(local, returned);
                assert_eq!(**lhs, Expr::Var(VarId(0)));
                assert_eq!(**rhs, Expr::int(3));
            }
            other => panic!("unexpected statements {other:?}"),
        }
    }

    #[test]
    fn constructor_folds_into_allocation() {
        let code = assemble(0, |asm| {
            asm.new_object("demo/A")?
                .op(DUP)?
                .invokespecial("demo/A", "<init>", "()V")?
                .op(ARETURN)?;
            Ok(())
        });

        let (stmts, _) = interpret(&code, 0).unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(
            &stmts[0],
            Stmt::Return(Some(Expr::New { ctor: Some(_), class, .. })) if class == "demo/A"
        ));
    }

    #[test]
    fn discarded_call_is_kept_as_statement() {
        let code = assemble(0, |asm| {
            asm.invokestatic("demo/A", "g", "()I")?.op(POP)?.op(RETURN)?;
            Ok(())
        });

        let (stmts, _) = interpret(&code, 0).unwrap();
        assert!(matches!(
            stmts.as_slice(),
            [Stmt::Eval(Expr::Call(_)), Stmt::Return(None)]
        ));
    }

    #[test]
    fn unresolved_static_read_stays_a_field_read() {
        let code = assemble(0, |asm| {
            asm.getstatic("demo/Missing", "x", "I")?.op(IRETURN)?;
            Ok(())
        });

        let (stmts, _) = interpret(&code, 0).unwrap();
        assert!(matches!(
            stmts.as_slice(),
            [Stmt::Return(Some(Expr::Field(field)))] if field.owner == "demo/Missing"
        ));
    }

    #[test]
    fn underflow_reports_offset() {
        let code = MethodCode {
            max_stack: 2,
            max_locals: 0,
            code: vec![ICONST_1, IADD, IRETURN],
            pool: Arc::new(ConstantPool::new()),
        };

        match interpret(&code, 0) {
            Err(Error::BadInstructionStream { offset, .. }) => assert_eq!(offset, 1),
            other => panic!("expected stack underflow, got {other:?}"),
        }
    }
}
