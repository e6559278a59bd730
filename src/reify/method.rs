//! Reification of one method body.
//!
//! The [`MethodTracer`] partitions the code into basic blocks, interprets each reachable block
//! once with a [`BlockTracer`] and propagates exit states to the successors. The first state
//! reaching a block becomes its entry state; later arrivals are merged into it. Blocks never
//! reached stay empty.

use std::collections::VecDeque;

use log::debug;

use crate::{
    ast::{Block, Body, FormalRole, Stmt, VarId, VarKind, VarTable, Variable},
    bytecode::decode_blocks,
    model::{ClassOracle, JType, MethodInfo},
    reify::{
        identity::IdentityResolver,
        ids::IdAllocator,
        interpreter::{BlockTracer, MethodContext},
        lambda::LambdaFactory,
        merge::{insert_before_jump, merge_states},
        state::{FrameState, Slot},
    },
    Result,
};

/// The raw reified form of a method, before any specialization.
#[derive(Debug, Clone)]
pub(crate) struct TracedMethod {
    /// All variables of the body
    pub vars: VarTable,
    /// Parameter variables, receiver first
    pub params: Vec<VarId>,
    /// One block per bytecode basic block
    pub body: Body,
}

/// Creates the parameter variables of `method`, receiver first.
///
/// Returns each variable with the local slot it occupies.
pub(crate) fn parameter_vars(
    owner: &str,
    method: &MethodInfo,
    vars: &mut VarTable,
) -> Vec<(VarId, u16)> {
    let mut params = Vec::new();
    let mut slot = 0u16;
    if !method.is_static() {
        let kind = VarKind::Param {
            role: FormalRole::Target,
            slot,
        };
        params.push((vars.push(Variable::new(kind, JType::object(owner))), slot));
        slot += 1;
    }
    for (index, ty) in method.signature.params.iter().enumerate() {
        let kind = VarKind::Param {
            role: FormalRole::Index(index as u16),
            slot,
        };
        params.push((vars.push(Variable::new(kind, ty.clone())), slot));
        slot += ty.slots() as u16;
    }
    params
}

/// Traces one method with code.
pub(crate) struct MethodTracer<'t> {
    ctx: MethodContext<'t>,
    method: &'t MethodInfo,
}

impl<'t> MethodTracer<'t> {
    /// Prepares tracing `method` declared by `owner`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the method has no code.
    pub fn new(
        classes: &'t dyn ClassOracle,
        owner: &str,
        method: &'t MethodInfo,
        sites: &'t mut IdAllocator,
        lambdas: &'t mut LambdaFactory,
    ) -> Result<Self> {
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| malformed_error!("method {} has no code", method.name))?;
        Ok(MethodTracer {
            ctx: MethodContext {
                classes,
                owner: owner.to_string(),
                ret: method.signature.ret.clone(),
                pool: code.pool.clone(),
                max_stack: usize::from(code.max_stack),
                vars: VarTable::new(),
                temps: IdAllocator::new(),
                sites,
                lambdas,
            },
            method,
        })
    }

    /// Reifies the method.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadInstructionStream`] if the abstract stack becomes inconsistent
    /// anywhere in the body, and any error of the instruction decoder or the interpreter.
    pub fn trace(mut self) -> Result<TracedMethod> {
        let method = self.method;
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| malformed_error!("method {} has no code", method.name))?;
        let blocks = decode_blocks(&code.code)?;
        if blocks.is_empty() {
            return Err(malformed_error!("method {} has an empty body", method.name));
        }

        let (entry, params) = self.entry_state(usize::from(code.max_locals))?;
        let mut identity = IdentityResolver::new();
        let mut states: Vec<Option<FrameState>> = vec![None; blocks.len()];
        let mut output: Vec<Option<Vec<Stmt>>> = vec![None; blocks.len()];
        states[0] = Some(entry);

        let mut worklist = VecDeque::from([0usize]);
        while let Some(index) = worklist.pop_front() {
            if output[index].is_some() {
                continue;
            }
            let Some(state) = states[index].clone() else {
                continue;
            };

            let block = &blocks[index];
            let end = block.last().map_or(block.offset, |i| i.offset);
            let (mut stmts, mut exit) =
                BlockTracer::new(&mut self.ctx, &blocks, state).run(block)?;

            let successors = successors(&stmts, index, blocks.len(), end)?;
            if successors.iter().any(|s| states[*s].is_none()) {
                self.spill_exit(&mut exit, &mut stmts);
            }

            for successor in successors {
                if states[successor].is_none() {
                    states[successor] = Some(exit.clone());
                    worklist.push_back(successor);
                } else if let Some(entry) = states[successor].as_mut() {
                    merge_states(&mut self.ctx, &mut identity, entry, &exit, &mut stmts, end)?;
                }
            }
            output[index] = Some(stmts);
        }

        let mut vars = self.ctx.vars;
        identity.resolve(&mut vars, &mut IdAllocator::new());

        let body = Body::new(
            output
                .into_iter()
                .map(|stmts| Block::new(stmts.unwrap_or_default()))
                .collect(),
        );
        debug!(
            "Traced {}.{}{}: {} blocks, {} variables",
            self.ctx.owner,
            method.name,
            method.descriptor,
            body.len(),
            vars.len()
        );

        Ok(TracedMethod { vars, params, body })
    }

    fn entry_state(&mut self, max_locals: usize) -> Result<(FrameState, Vec<VarId>)> {
        let mut state = FrameState::new(max_locals);
        let params = parameter_vars(&self.ctx.owner, self.method, &mut self.ctx.vars);
        for (var, slot) in &params {
            let width = self.ctx.vars[*var].ty.slots();
            if usize::from(*slot) + width > max_locals {
                return Err(bad_stream!(
                    0,
                    "parameters of {} exceed {} local slots",
                    self.method.name,
                    max_locals
                ));
            }
            state.locals[usize::from(*slot)] = Some(*var);
        }
        Ok((state, params.into_iter().map(|(var, _)| var).collect()))
    }

    /// Moves every stack value that is neither a temporary nor an allocation marker into a
    /// temporary, so the exit state can become the entry state of a successor.
    fn spill_exit(&mut self, exit: &mut FrameState, stmts: &mut Vec<Stmt>) {
        for index in 0..exit.stack.len() {
            let Slot::Value(value) = &exit.stack[index] else {
                continue;
            };
            if self.ctx.is_temp_read(value) || value.is_new_marker() {
                continue;
            }
            let value = value.clone();
            let ty = value.ty(&self.ctx.vars);
            let temp = self.ctx.temp(ty);
            insert_before_jump(stmts, Stmt::assign(temp, value));
            exit.stack[index] = Slot::Value(crate::ast::Expr::Var(temp));
        }
    }
}

/// Control successors of a block, in order and without duplicates.
fn successors(stmts: &[Stmt], index: usize, count: usize, offset: usize) -> Result<Vec<usize>> {
    let next = || {
        if index + 1 < count {
            Ok(index + 1)
        } else {
            Err(bad_stream!(offset, "control falls off the end of the code"))
        }
    };

    let mut targets = match stmts.last() {
        Some(Stmt::Branch { target, .. }) => vec![*target, next()?],
        Some(Stmt::Goto(target)) => vec![*target],
        Some(stmt @ Stmt::Switch { .. }) => stmt.jump_targets(),
        Some(Stmt::Return(_) | Stmt::Throw(_)) => Vec::new(),
        _ => vec![next()?],
    };

    let mut seen = Vec::with_capacity(targets.len());
    targets.retain(|t| {
        if seen.contains(t) {
            false
        } else {
            seen.push(*t);
            true
        }
    });
    Ok(targets)
}
