//! The typed abstract syntax tree produced by the reifier.
//!
//! Method bodies are represented as a [`Body`] of [`Block`]s holding [`Stmt`]s, which in turn
//! hold [`Expr`] trees. Variables are stored once per function in a [`VarTable`] and referenced
//! by [`VarId`]. The session-level tables ([`Function`], [`TypeDef`], [`Dispatcher`]) index
//! each other by id, so the whole result can be cloned into a [`crate::reify::Snapshot`]
//! without reference cycles.
//!
//! All node types implement [`std::fmt::Display`] with a compact Java-like rendering meant for
//! diagnostics and tests.

mod body;
mod expr;
mod function;
mod stmt;
mod typedef;
mod variable;

pub use body::{Block, Body};
pub use expr::{
    BinaryOp, Call, Callee, CondOp, Condition, Expr, FieldAccess, InvokeKind, Literal, NewSite,
    UnaryOp,
};
pub use function::{Function, FunctionBody, FunctionFlags, FunctionId};
pub use stmt::{InlinedFunction, LValue, LoopHeader, Stmt};
pub use typedef::{Dispatcher, DispatcherId, TypeDef};
pub use variable::{FormalRole, VarId, VarKind, VarTable, Variable};
