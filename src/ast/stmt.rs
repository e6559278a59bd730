//! Statement nodes.

use std::fmt;

use crate::{
    ast::{Body, Condition, Expr, FieldAccess, FunctionId, VarId},
    model::JType,
};

/// The target of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    /// A variable
    Var(VarId),
    /// A static or instance field
    Field(FieldAccess),
    /// An array element
    ArrayElem {
        /// Array reference
        array: Expr,
        /// Element index
        index: Expr,
        /// Element type
        ty: JType,
    },
}

/// A callee body spliced into its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct InlinedFunction {
    /// The function that was inlined
    pub function: FunctionId,
    /// Argument bindings evaluated before the body
    pub init: Vec<Stmt>,
    /// The renamed callee body; a jump to `body.blocks.len()` leaves the body
    pub body: Body,
    /// Variable receiving the return value, if the call's value is used
    pub result: Option<VarId>,
}

/// A recovered counted loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopHeader {
    /// Loop variable initialization
    pub init: Stmt,
    /// Condition under which the body is executed
    pub cond: Condition,
    /// Loop variable update after each iteration
    pub step: Stmt,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Assignment
    Assign {
        /// Assigned location
        target: LValue,
        /// Assigned value
        value: Expr,
    },
    /// Expression evaluated for its side effects
    Eval(Expr),
    /// Jump to block `target` if `cond` holds
    Branch {
        /// Branch condition
        cond: Condition,
        /// Target block index
        target: usize,
    },
    /// Unconditional jump to a block index
    Goto(usize),
    /// Multi-way jump
    Switch {
        /// Switch key
        key: Expr,
        /// Case values with their target block indices
        cases: Vec<(i32, usize)>,
        /// Target block index for unmatched keys
        default: usize,
    },
    /// Return, with a value for non-`void` functions
    Return(Option<Expr>),
    /// Throw an exception object
    Throw(Expr),
    /// Acquire an object monitor
    MonitorEnter(Expr),
    /// Release an object monitor
    MonitorExit(Expr),
    /// A statement-like inlined call
    Inlined(Box<InlinedFunction>),
    /// Start of a recovered `for` loop
    LoopBegin(Box<LoopHeader>),
    /// End of the loop whose [`Stmt::LoopBegin`] is in block `header`
    LoopEnd {
        /// Block index holding the loop begin marker
        header: usize,
    },
    /// Removed statement
    Nop,
}

impl Stmt {
    /// Shorthand for an assignment to a variable.
    #[must_use]
    pub fn assign(var: VarId, value: Expr) -> Stmt {
        Stmt::Assign {
            target: LValue::Var(var),
            value,
        }
    }

    /// Returns `true` if control never falls through to the next statement.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Stmt::Goto(_) | Stmt::Switch { .. } | Stmt::Return(_) | Stmt::Throw(_)
        )
    }

    /// Returns `true` for statements that transfer control, conditionally or not.
    #[must_use]
    pub fn is_jump(&self) -> bool {
        self.is_terminator() || matches!(self, Stmt::Branch { .. })
    }

    /// Block indices this statement may jump to.
    #[must_use]
    pub fn jump_targets(&self) -> Vec<usize> {
        match self {
            Stmt::Branch { target, .. } | Stmt::Goto(target) => vec![*target],
            Stmt::Switch { cases, default, .. } => {
                let mut targets: Vec<usize> = cases.iter().map(|(_, t)| *t).collect();
                targets.push(*default);
                targets
            }
            _ => Vec::new(),
        }
    }

    /// The variable assigned by this statement, if it is a variable assignment.
    #[must_use]
    pub fn assigned_var(&self) -> Option<VarId> {
        match self {
            Stmt::Assign {
                target: LValue::Var(var),
                ..
            } => Some(*var),
            _ => None,
        }
    }

    /// Visits every top-level expression, nested statements of inlined bodies and loop
    /// headers included.
    pub fn for_each_expr(&self, f: &mut dyn FnMut(&Expr)) {
        match self {
            Stmt::Assign { target, value } => {
                match target {
                    LValue::Var(_) => {}
                    LValue::Field(field) => {
                        if let Some(object) = &field.target {
                            f(object);
                        }
                    }
                    LValue::ArrayElem { array, index, .. } => {
                        f(array);
                        f(index);
                    }
                }
                f(value);
            }
            Stmt::Eval(e)
            | Stmt::Return(Some(e))
            | Stmt::Throw(e)
            | Stmt::MonitorEnter(e)
            | Stmt::MonitorExit(e)
            | Stmt::Switch { key: e, .. } => f(e),
            Stmt::Branch { cond, .. } => {
                f(&cond.lhs);
                f(&cond.rhs);
            }
            Stmt::Inlined(inlined) => {
                for stmt in &inlined.init {
                    stmt.for_each_expr(f);
                }
                for block in &inlined.body.blocks {
                    for stmt in &block.stmts {
                        stmt.for_each_expr(f);
                    }
                }
            }
            Stmt::LoopBegin(header) => {
                header.init.for_each_expr(f);
                f(&header.cond.lhs);
                f(&header.cond.rhs);
                header.step.for_each_expr(f);
            }
            Stmt::Goto(_) | Stmt::Return(None) | Stmt::LoopEnd { .. } | Stmt::Nop => {}
        }
    }

    /// Mutable counterpart of [`Stmt::for_each_expr`].
    pub fn for_each_expr_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        match self {
            Stmt::Assign { target, value } => {
                match target {
                    LValue::Var(_) => {}
                    LValue::Field(field) => {
                        if let Some(object) = &mut field.target {
                            f(object);
                        }
                    }
                    LValue::ArrayElem { array, index, .. } => {
                        f(array);
                        f(index);
                    }
                }
                f(value);
            }
            Stmt::Eval(e)
            | Stmt::Return(Some(e))
            | Stmt::Throw(e)
            | Stmt::MonitorEnter(e)
            | Stmt::MonitorExit(e)
            | Stmt::Switch { key: e, .. } => f(e),
            Stmt::Branch { cond, .. } => {
                f(&mut cond.lhs);
                f(&mut cond.rhs);
            }
            Stmt::Inlined(inlined) => {
                for stmt in &mut inlined.init {
                    stmt.for_each_expr_mut(f);
                }
                for block in &mut inlined.body.blocks {
                    for stmt in &mut block.stmts {
                        stmt.for_each_expr_mut(f);
                    }
                }
            }
            Stmt::LoopBegin(header) => {
                header.init.for_each_expr_mut(f);
                f(&mut header.cond.lhs);
                f(&mut header.cond.rhs);
                header.step.for_each_expr_mut(f);
            }
            Stmt::Goto(_) | Stmt::Return(None) | Stmt::LoopEnd { .. } | Stmt::Nop => {}
        }
    }

    /// Renames every variable this statement reads or assigns.
    pub fn rename_vars(&mut self, map: &dyn Fn(VarId) -> VarId) {
        let rename = &mut |e: &mut Expr| {
            e.walk_mut(&mut |node| {
                if let Expr::Var(var) = node {
                    *var = map(*var);
                }
            });
        };
        match self {
            Stmt::Inlined(inlined) => {
                if let Some(result) = &mut inlined.result {
                    *result = map(*result);
                }
                for stmt in inlined
                    .init
                    .iter_mut()
                    .chain(inlined.body.blocks.iter_mut().flat_map(|b| b.stmts.iter_mut()))
                {
                    stmt.rename_vars(map);
                }
            }
            Stmt::LoopBegin(header) => {
                header.init.rename_vars(map);
                header.step.rename_vars(map);
                rename(&mut header.cond.lhs);
                rename(&mut header.cond.rhs);
            }
            _ => {
                self.for_each_expr_mut(rename);
                if let Stmt::Assign {
                    target: LValue::Var(var),
                    ..
                } = self
                {
                    *var = map(*var);
                }
            }
        }
    }
}

impl fmt::Display for LValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LValue::Var(var) => write!(f, "{var}"),
            LValue::Field(field) => write!(f, "{}", Expr::Field(field.clone())),
            LValue::ArrayElem { array, index, .. } => write!(f, "{array}[{index}]"),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { target, value } => write!(f, "{target} = {value};"),
            Stmt::Eval(e) => write!(f, "{e};"),
            Stmt::Branch { cond, target } => write!(f, "if ({cond}) goto B{target};"),
            Stmt::Goto(target) => write!(f, "goto B{target};"),
            Stmt::Switch {
                key,
                cases,
                default,
            } => {
                write!(f, "switch ({key}) {{")?;
                for (value, target) in cases {
                    write!(f, " case {value}: B{target};")?;
                }
                write!(f, " default: B{default}; }}")
            }
            Stmt::Return(Some(e)) => write!(f, "return {e};"),
            Stmt::Return(None) => write!(f, "return;"),
            Stmt::Throw(e) => write!(f, "throw {e};"),
            Stmt::MonitorEnter(e) => write!(f, "monitorenter {e};"),
            Stmt::MonitorExit(e) => write!(f, "monitorexit {e};"),
            Stmt::Inlined(inlined) => {
                write!(f, "inline f{} {{", inlined.function.0)?;
                for stmt in &inlined.init {
                    write!(f, " {stmt}")?;
                }
                for (index, block) in inlined.body.blocks.iter().enumerate() {
                    write!(f, " B{index}:")?;
                    for stmt in &block.stmts {
                        write!(f, " {stmt}")?;
                    }
                }
                write!(f, " }}")?;
                if let Some(result) = inlined.result {
                    write!(f, " -> {result}")?;
                }
                Ok(())
            }
            Stmt::LoopBegin(header) => {
                let init = header.init.to_string();
                let step = header.step.to_string();
                write!(
                    f,
                    "for ({} {}; {}) {{",
                    init,
                    header.cond,
                    step.trim_end_matches(';')
                )
            }
            Stmt::LoopEnd { header } => write!(f, "}} // loop B{header}"),
            Stmt::Nop => write!(f, ";"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CondOp, Literal};

    fn branch(target: usize) -> Stmt {
        Stmt::Branch {
            cond: Condition {
                op: CondOp::Lt,
                lhs: Expr::Var(VarId(0)),
                rhs: Expr::int(10),
            },
            target,
        }
    }

    #[test]
    fn terminators() {
        assert!(Stmt::Goto(1).is_terminator());
        assert!(Stmt::Return(None).is_terminator());
        assert!(!branch(2).is_terminator());
        assert!(branch(2).is_jump());
        assert!(!Stmt::Nop.is_jump());
    }

    #[test]
    fn switch_targets_end_with_default() {
        let stmt = Stmt::Switch {
            key: Expr::Var(VarId(0)),
            cases: vec![(1, 3), (2, 4)],
            default: 5,
        };
        assert_eq!(stmt.jump_targets(), vec![3, 4, 5]);
    }

    #[test]
    fn rename_covers_targets_and_reads() {
        let mut stmt = Stmt::assign(
            VarId(1),
            Expr::Binary {
                op: crate::ast::BinaryOp::Add,
                lhs: Box::new(Expr::Var(VarId(1))),
                rhs: Box::new(Expr::Literal(Literal::Int(1))),
                ty: JType::Int,
            },
        );
        stmt.rename_vars(&|v| VarId(v.0 + 10));
        assert_eq!(stmt.to_string(), "v11 = (v11 + 1);");
        assert_eq!(stmt.assigned_var(), Some(VarId(11)));
    }
}
