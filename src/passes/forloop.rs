//! Recovery of counted `for` loops.
//!
//! Two layouts are recognized. Variables are matched by identity, so the initialization, the
//! condition and the step may refer to different [`VarId`]s of the same source variable.
//!
//! ```text
//! condition first                     condition last
//!
//! h-1: ...; i = init                  p:   ...; i = init; goto t
//! h:   if (!cond) goto exit; ...      p+1: body...
//!      body...                        t-1: ...; i = step
//! l:   ...; i = step; goto h          t:   if (cond) goto p+1
//! l+1: exit                           t+1: exit
//! ```
//!
//! A match requires exactly two control transfers into the loop head. Loops of any other shape
//! stay as plain jumps.

use log::debug;

use crate::{
    ast::{Body, Condition, Expr, LValue, LoopHeader, Stmt, VarId, VarTable},
    passes::BodyPass,
};

/// Loop recovery as a [`BodyPass`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopRecoveryPass;

impl BodyPass for LoopRecoveryPass {
    fn name(&self) -> &'static str {
        "forloop"
    }

    fn description(&self) -> &'static str {
        "Recovers counted for loops"
    }

    fn run(&self, body: &mut Body, vars: &VarTable) -> bool {
        recover_loops(body, vars) > 0
    }
}

/// Rewrites every recognized counted loop of `body`, returning the number of loops found.
///
/// Incoming counters must be current, as left by
/// [`eliminate_dead_code`](crate::passes::eliminate_dead_code).
pub fn recover_loops(body: &mut Body, vars: &VarTable) -> usize {
    let mut found = 0;
    for header in 0..body.blocks.len() {
        if condition_first(body, vars, header) || condition_last(body, vars, header) {
            found += 1;
        }
    }
    if found > 0 {
        debug!("forloop: {} loops recovered", found);
    }
    found
}

/// The `javac` layout: the condition heads the loop, the latch jumps back.
fn condition_first(body: &mut Body, vars: &VarTable, header: usize) -> bool {
    if header == 0 || body.blocks[header].incoming != 2 {
        return false;
    }
    let Some(Stmt::Branch { cond, target: exit }) = body.blocks[header].stmts.first() else {
        return false;
    };
    let exit = *exit;
    if exit <= header + 1 || exit > body.blocks.len() {
        return false;
    }
    let Some(latch) = (header..exit).rev().find(|b| !body.blocks[*b].is_empty()) else {
        return false;
    };
    if latch + 1 != exit || latch == header {
        return false;
    }

    let preheader = &body.blocks[header - 1].stmts;
    let Some(init) = preheader.last().filter(|s| !s.is_jump()) else {
        return false;
    };
    let Some(var) = init.assigned_var() else {
        return false;
    };

    let latch_stmts = &body.blocks[latch].stmts;
    let [.., step, Stmt::Goto(back)] = latch_stmts.as_slice() else {
        return false;
    };
    if *back != header || !is_step_of(step, var, vars) || !reads(cond, var, vars) {
        return false;
    }

    let loop_header = LoopHeader {
        init: init.clone(),
        cond: cond.negate(),
        step: step.clone(),
    };
    let init_index = preheader.len() - 1;
    let step_index = latch_stmts.len() - 2;
    let back_index = latch_stmts.len() - 1;

    body.blocks[header - 1].stmts[init_index] = Stmt::Nop;
    body.blocks[header].stmts[0] = Stmt::LoopBegin(Box::new(loop_header));
    body.blocks[latch].stmts[step_index] = Stmt::Nop;
    body.blocks[latch].stmts[back_index] = Stmt::LoopEnd { header };
    true
}

/// The `ecj` layout: the loop is entered through a jump to the trailing condition.
fn condition_last(body: &mut Body, vars: &VarTable, test: usize) -> bool {
    if test < 2 || body.blocks[test].incoming != 2 {
        return false;
    }
    let [Stmt::Branch { cond, target: entry }] = body.blocks[test].stmts.as_slice() else {
        return false;
    };
    let entry = *entry;
    if entry == 0 || entry >= test {
        return false;
    }
    let pre = entry - 1;

    let pre_stmts = &body.blocks[pre].stmts;
    let [.., init, Stmt::Goto(jump)] = pre_stmts.as_slice() else {
        return false;
    };
    if *jump != test {
        return false;
    }
    let Some(var) = init.assigned_var() else {
        return false;
    };

    let Some(latch) = (entry..test).rev().find(|b| !body.blocks[*b].is_empty()) else {
        return false;
    };
    let Some(step) = body.blocks[latch].stmts.last() else {
        return false;
    };
    if step.is_jump() || !is_step_of(step, var, vars) || !reads(cond, var, vars) {
        return false;
    }

    let loop_header = LoopHeader {
        init: init.clone(),
        cond: cond.clone(),
        step: step.clone(),
    };
    let init_index = pre_stmts.len() - 2;
    let jump_index = pre_stmts.len() - 1;
    let step_index = body.blocks[latch].stmts.len() - 1;

    body.blocks[pre].stmts[init_index] = Stmt::Nop;
    body.blocks[pre].stmts[jump_index] = Stmt::LoopBegin(Box::new(loop_header));
    body.blocks[latch].stmts[step_index] = Stmt::Nop;
    body.blocks[test].stmts[0] = Stmt::LoopEnd { header: pre };
    true
}

fn same_var(vars: &VarTable, a: VarId, b: VarId) -> bool {
    a == b || vars[a].ident().is_some_and(|ident| vars[b].ident() == Some(ident))
}

fn is_step_of(step: &Stmt, var: VarId, vars: &VarTable) -> bool {
    match step {
        Stmt::Assign {
            target: LValue::Var(assigned),
            value,
        } => same_var(vars, *assigned, var) && reads_expr(value, var, vars),
        _ => false,
    }
}

fn reads(cond: &Condition, var: VarId, vars: &VarTable) -> bool {
    reads_expr(&cond.lhs, var, vars) || reads_expr(&cond.rhs, var, vars)
}

fn reads_expr(expr: &Expr, var: VarId, vars: &VarTable) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if let Expr::Var(read) = e {
            found |= same_var(vars, *read, var);
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{BinaryOp, Block, CondOp, VarKind, Variable},
        model::JType,
    };

    fn loop_vars() -> (VarTable, VarId, VarId, VarId) {
        let mut vars = VarTable::new();
        let n = vars.push(Variable::new(
            VarKind::Param {
                role: crate::ast::FormalRole::Index(0),
                slot: 0,
            },
            JType::Int,
        ));
        let i0 = vars.push(Variable::new(VarKind::Local { slot: 1 }, JType::Int));
        let i1 = vars.push(Variable::new(VarKind::Local { slot: 1 }, JType::Int));
        vars[n].set_ident(0);
        vars[i0].set_ident(1);
        vars[i1].set_ident(1);
        vars[i0].mark_mutable();
        (vars, n, i0, i1)
    }

    fn increment(target: VarId, source: VarId) -> Stmt {
        Stmt::assign(
            target,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Var(source)),
                rhs: Box::new(Expr::int(1)),
                ty: JType::Int,
            },
        )
    }

    #[test]
    fn condition_first_layout() {
        let (vars, n, i0, i1) = loop_vars();
        let exit_cond = Condition {
            op: CondOp::Ge,
            lhs: Expr::Var(i0),
            rhs: Expr::Var(n),
        };
        let mut body = Body::new(vec![
            Block::new(vec![Stmt::assign(i0, Expr::int(0))]),
            Block::new(vec![Stmt::Branch {
                cond: exit_cond,
                target: 3,
            }]),
            Block::new(vec![Stmt::Eval(Expr::Var(i0)), increment(i1, i0), Stmt::Goto(1)]),
            Block::new(vec![Stmt::Return(None)]),
        ]);
        body.recount_incoming();

        assert_eq!(recover_loops(&mut body, &vars), 1);
        assert_eq!(body.blocks[0].stmts, vec![Stmt::Nop]);
        let Stmt::LoopBegin(header) = &body.blocks[1].stmts[0] else {
            panic!("expected loop begin");
        };
        assert_eq!(header.cond.op, CondOp::Lt);
        assert_eq!(header.init, Stmt::assign(i0, Expr::int(0)));
        assert_eq!(body.blocks[2].stmts[1], Stmt::Nop);
        assert_eq!(body.blocks[2].stmts[2], Stmt::LoopEnd { header: 1 });
    }

    #[test]
    fn condition_last_layout() {
        let (vars, n, i0, i1) = loop_vars();
        let cond = Condition {
            op: CondOp::Lt,
            lhs: Expr::Var(i0),
            rhs: Expr::Var(n),
        };
        let mut body = Body::new(vec![
            Block::new(vec![Stmt::assign(i0, Expr::int(0)), Stmt::Goto(2)]),
            Block::new(vec![Stmt::Eval(Expr::Var(i0)), increment(i1, i0)]),
            Block::new(vec![Stmt::Branch { cond, target: 1 }]),
            Block::new(vec![Stmt::Return(None)]),
        ]);
        body.recount_incoming();

        assert_eq!(recover_loops(&mut body, &vars), 1);
        assert_eq!(body.blocks[0].stmts[0], Stmt::Nop);
        let Stmt::LoopBegin(header) = &body.blocks[0].stmts[1] else {
            panic!("expected loop begin");
        };
        assert_eq!(header.cond.op, CondOp::Lt);
        assert_eq!(body.blocks[1].stmts[1], Stmt::Nop);
        assert_eq!(body.blocks[2].stmts, vec![Stmt::LoopEnd { header: 0 }]);
    }

    #[test]
    fn unrelated_step_is_not_a_loop() {
        let (vars, n, i0, _) = loop_vars();
        let cond = Condition {
            op: CondOp::Lt,
            lhs: Expr::Var(i0),
            rhs: Expr::Var(n),
        };
        let mut body = Body::new(vec![
            Block::new(vec![Stmt::assign(i0, Expr::int(0)), Stmt::Goto(2)]),
            Block::new(vec![Stmt::Eval(Expr::Var(i0))]),
            Block::new(vec![Stmt::Branch { cond, target: 1 }]),
            Block::new(vec![Stmt::Return(None)]),
        ]);
        body.recount_incoming();

        assert_eq!(recover_loops(&mut body, &vars), 0);
    }
}
