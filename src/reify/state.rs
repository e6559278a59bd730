//! Abstract frame state: operand stack and local variable slots.

use crate::ast::{Expr, VarId};

/// One operand stack slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Upper half of a 64-bit value
    Empty,
    /// A value
    Value(Expr),
}

/// The abstract frame at a point of a method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameState {
    /// Operand stack, top last
    pub stack: Vec<Slot>,
    /// Local variable slots; `None` for slots without a defined value
    pub locals: Vec<Option<VarId>>,
}

impl FrameState {
    /// Creates a state with an empty stack and `max_locals` undefined locals.
    #[must_use]
    pub fn new(max_locals: usize) -> Self {
        FrameState {
            stack: Vec::new(),
            locals: vec![None; max_locals],
        }
    }

    /// Current stack depth in slots.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Indices of stack slots holding a value (as opposed to [`Slot::Empty`]).
    pub fn value_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.stack
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Slot::Value(_)))
            .map(|(index, _)| index)
    }
}
