//! Dead code elimination.
//!
//! # Algorithm
//!
//! 1. Branches whose condition compares statically known operands are folded into a `goto`
//!    (condition holds) or removed (condition fails). Operands are known if they are literals
//!    or immutable variables with a compile-time value; a variable holding a fresh allocation
//!    is known to be non-null.
//! 2. Blocks are walked from the entry. Statements after the first terminator of a reachable
//!    block are dropped, unreached blocks are cleared.
//! 3. A `goto` to the block control would fall through to anyway is removed.
//! 4. Incoming jump counters are rebuilt.
//!
//! The bodies of inlined callees are processed the same way. Running the pass twice changes
//! nothing the second time.

use log::debug;

use crate::{
    ast::{Body, CondOp, Condition, Expr, Literal, Stmt, VarTable},
    passes::BodyPass,
};

/// Dead code elimination as a [`BodyPass`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadCodePass;

impl BodyPass for DeadCodePass {
    fn name(&self) -> &'static str {
        "deadcode"
    }

    fn description(&self) -> &'static str {
        "Folds constant branches and removes unreachable statements"
    }

    fn run(&self, body: &mut Body, vars: &VarTable) -> bool {
        eliminate_dead_code(body, vars)
    }
}

/// Removes unreachable code from `body`.
///
/// Returns `true` if any statement changed. Incoming counters are rebuilt in every case.
pub fn eliminate_dead_code(body: &mut Body, vars: &VarTable) -> bool {
    let mut changed = false;
    for stmt in body.stmts_mut() {
        if let Stmt::Inlined(inlined) = stmt {
            changed |= eliminate_dead_code(&mut inlined.body, vars);
        }
    }

    let folded = fold_branches(body, vars);
    let removed = remove_unreachable(body);
    let gotos = remove_redundant_gotos(body);
    body.recount_incoming();

    if folded + removed + gotos > 0 {
        debug!(
            "deadcode: {} branches folded, {} statements removed, {} gotos removed",
            folded, removed, gotos
        );
        changed = true;
    }
    changed
}

/// Statically evaluates a condition.
#[must_use]
pub(crate) fn evaluate(cond: &Condition, vars: &VarTable) -> Option<bool> {
    let lhs = known(&cond.lhs, vars)?;
    let rhs = known(&cond.rhs, vars)?;
    match (lhs, rhs) {
        (Known::Literal(a), Known::Literal(b)) => a.compare(cond.op, &b),
        (Known::NonNull, Known::Literal(Literal::Null))
        | (Known::Literal(Literal::Null), Known::NonNull) => match cond.op {
            CondOp::Eq => Some(false),
            CondOp::Ne => Some(true),
            _ => None,
        },
        _ => None,
    }
}

enum Known {
    Literal(Literal),
    NonNull,
}

fn known(expr: &Expr, vars: &VarTable) -> Option<Known> {
    match expr {
        Expr::Literal(literal) => Some(Known::Literal(literal.clone())),
        Expr::New { .. } => Some(Known::NonNull),
        Expr::Var(var) => match vars.get(*var)?.known_value()? {
            Expr::Literal(literal) => Some(Known::Literal(literal.clone())),
            Expr::New { .. } => Some(Known::NonNull),
            _ => None,
        },
        _ => None,
    }
}

fn fold_branches(body: &mut Body, vars: &VarTable) -> usize {
    let mut folded = 0;
    for block in &mut body.blocks {
        let Some(Stmt::Branch { cond, target }) = block.stmts.last() else {
            continue;
        };
        match evaluate(cond, vars) {
            Some(true) => {
                let target = *target;
                block.stmts.pop();
                block.stmts.push(Stmt::Goto(target));
                folded += 1;
            }
            Some(false) => {
                block.stmts.pop();
                folded += 1;
            }
            None => {}
        }
    }
    folded
}

fn remove_unreachable(body: &mut Body) -> usize {
    let count = body.blocks.len();
    let mut reached = vec![false; count];
    let mut worklist = Vec::new();
    let mut removed = 0;
    if count > 0 {
        reached[0] = true;
        worklist.push(0);
    }

    while let Some(index) = worklist.pop() {
        let block = &mut body.blocks[index];
        if let Some(end) = block.stmts.iter().position(Stmt::is_terminator) {
            removed += block.stmts.len() - end - 1;
            block.stmts.truncate(end + 1);
        }

        let mut targets: Vec<usize> = block.stmts.iter().flat_map(Stmt::jump_targets).collect();
        if block.falls_through() {
            targets.push(index + 1);
        }
        for target in targets {
            if target < count && !reached[target] {
                reached[target] = true;
                worklist.push(target);
            }
        }
    }

    for (block, reached) in body.blocks.iter_mut().zip(reached) {
        if !reached && !block.is_empty() {
            removed += block.stmts.len();
            block.clear();
        }
    }
    removed
}

fn remove_redundant_gotos(body: &mut Body) -> usize {
    let mut removed = 0;
    for index in (0..body.blocks.len()).rev() {
        let Some(Stmt::Goto(target)) = body.blocks[index].stmts.last() else {
            continue;
        };
        let target = *target;
        if target > index && body.blocks[index + 1..target.min(body.blocks.len())]
            .iter()
            .all(|b| b.is_empty())
        {
            body.blocks[index].stmts.pop();
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{Block, VarKind, Variable},
        model::JType,
    };

    fn cond(op: CondOp, lhs: Expr, rhs: Expr) -> Condition {
        Condition { op, lhs, rhs }
    }

    #[test]
    fn false_branch_is_removed() {
        let mut vars = VarTable::new();
        let mut flag = Variable::new(VarKind::Local { slot: 0 }, JType::Boolean);
        flag.value = Some(Expr::int(0));
        let flag = vars.push(flag);

        // if (flag == 0) goto 2; call(); 2: return;
        let mut body = Body::new(vec![
            Block::new(vec![Stmt::Branch {
                cond: cond(CondOp::Ne, Expr::Var(flag), Expr::int(0)),
                target: 2,
            }]),
            Block::new(vec![Stmt::Eval(Expr::int(1))]),
            Block::new(vec![Stmt::Return(None)]),
        ]);

        assert!(eliminate_dead_code(&mut body, &vars));
        assert!(body.blocks[0].is_empty());
        assert_eq!(body.blocks[1].stmts.len(), 1);
    }

    #[test]
    fn true_branch_drops_fallthrough() {
        let vars = VarTable::new();
        let mut body = Body::new(vec![
            Block::new(vec![Stmt::Branch {
                cond: cond(CondOp::Lt, Expr::int(1), Expr::int(2)),
                target: 2,
            }]),
            Block::new(vec![Stmt::Eval(Expr::int(1))]),
            Block::new(vec![Stmt::Return(None)]),
        ]);

        assert!(eliminate_dead_code(&mut body, &vars));
        assert!(body.blocks[0].is_empty());
        assert!(body.blocks[1].is_empty());
        assert_eq!(body.blocks[2].stmts, vec![Stmt::Return(None)]);
        assert_eq!(body.blocks[2].incoming, 1);
    }

    #[test]
    fn dead_tail_and_chained_gotos() {
        let vars = VarTable::new();
        let mut body = Body::new(vec![
            Block::new(vec![Stmt::Goto(2)]),
            Block::new(vec![Stmt::Goto(3), Stmt::Eval(Expr::int(7))]),
            Block::new(vec![Stmt::Goto(3)]),
            Block::new(vec![Stmt::Return(None), Stmt::Eval(Expr::int(8))]),
        ]);

        assert!(eliminate_dead_code(&mut body, &vars));
        assert!(body.blocks[0].is_empty());
        assert!(body.blocks[1].is_empty());
        assert!(body.blocks[2].is_empty());
        assert_eq!(body.blocks[3].stmts, vec![Stmt::Return(None)]);
        assert!(!eliminate_dead_code(&mut body, &vars));
    }

    #[test]
    fn allocation_is_non_null() {
        let mut vars = VarTable::new();
        let mut object = Variable::new(VarKind::Local { slot: 0 }, JType::object("demo/A"));
        object.value = Some(Expr::New {
            site: crate::ast::NewSite(0),
            class: "demo/A".to_string(),
            ctor: None,
        });
        let object = vars.push(object);
        let check = cond(CondOp::Eq, Expr::Var(object), Expr::Literal(Literal::Null));
        assert_eq!(evaluate(&check, &vars), Some(false));
    }
}
