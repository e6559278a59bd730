//! Variables and the per-function variable arena.
//!
//! Variables are created by the interpreter for every store ([`VarKind::Local`]), for the
//! method parameters ([`VarKind::Param`]) and for spilled operand stack values
//! ([`VarKind::Temp`]). They live in a [`VarTable`] owned by the function and are referenced
//! from expressions by [`VarId`].
//!
//! After tracing, variables that stand for the same source-level variable along merging control
//! paths share one identity identifier ([`Variable::ident`]).

use std::{
    fmt,
    ops::{Index, IndexMut},
};

use crate::{ast::Expr, model::JType};

/// Index of a variable inside its function's [`VarTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The formal role of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormalRole {
    /// The receiver of an instance method
    Target,
    /// Declared parameter `n`, counted from zero without the receiver
    Index(u16),
}

/// What a variable was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// A store into a local variable slot
    Local {
        /// Local variable slot
        slot: u16,
    },
    /// A method parameter as seen on entry
    Param {
        /// Formal role
        role: FormalRole,
        /// Local variable slot holding the parameter
        slot: u16,
    },
    /// A spilled operand stack value
    Temp {
        /// Function-unique suffix
        suffix: u32,
    },
}

/// A variable of a traced function.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Origin of the variable
    pub kind: VarKind,
    /// Static type
    pub ty: JType,
    /// Set when the variable is assigned along more than one path
    pub mutable: bool,
    /// Compile-time value, only meaningful while `mutable` is unset
    pub value: Option<Expr>,
    ident: Option<u32>,
}

impl Variable {
    /// Creates an unidentified, immutable variable without a known value.
    #[must_use]
    pub fn new(kind: VarKind, ty: JType) -> Self {
        Variable {
            kind,
            ty,
            mutable: false,
            value: None,
            ident: None,
        }
    }

    /// Returns `true` for spilled stack values.
    #[must_use]
    pub fn is_temp(&self) -> bool {
        matches!(self.kind, VarKind::Temp { .. })
    }

    /// Local variable slot, if the variable is bound to one.
    #[must_use]
    pub fn slot(&self) -> Option<u16> {
        match self.kind {
            VarKind::Local { slot } | VarKind::Param { slot, .. } => Some(slot),
            VarKind::Temp { .. } => None,
        }
    }

    /// Identity identifier, once resolved.
    #[must_use]
    pub fn ident(&self) -> Option<u32> {
        self.ident
    }

    /// Sets the identity identifier.
    ///
    /// Identifiers are write-once: returns `false` and leaves the variable untouched if it
    /// already carries one.
    pub fn set_ident(&mut self, ident: u32) -> bool {
        if self.ident.is_some() {
            return false;
        }
        self.ident = Some(ident);
        true
    }

    /// Replaces the identity identifier while a function body is copied into another function.
    pub(crate) fn reassign_ident(&mut self, ident: Option<u32>) {
        self.ident = ident;
    }

    /// Marks the variable as assigned along several paths.
    ///
    /// The compile-time value is dropped on the first mutation. Returns `true` if the variable
    /// was immutable before.
    pub fn mark_mutable(&mut self) -> bool {
        if self.mutable {
            return false;
        }
        self.mutable = true;
        self.value = None;
        true
    }

    /// The compile-time value, if the variable is immutable and has one.
    #[must_use]
    pub fn known_value(&self) -> Option<&Expr> {
        if self.mutable {
            None
        } else {
            self.value.as_ref()
        }
    }
}

/// Arena of the variables of one function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarTable {
    vars: Vec<Variable>,
}

impl VarTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable and returns its id.
    pub fn push(&mut self, var: Variable) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(var);
        id
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if the table holds no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, id: VarId) -> Option<&Variable> {
        self.vars.get(id.0 as usize)
    }

    /// Looks up a variable for modification.
    pub fn get_mut(&mut self, id: VarId) -> Option<&mut Variable> {
        self.vars.get_mut(id.0 as usize)
    }

    /// Iterates over all variables with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(index, var)| (VarId(index as u32), var))
    }

    /// Highest identity identifier in use, if any variable is identified.
    #[must_use]
    pub fn max_ident(&self) -> Option<u32> {
        self.vars.iter().filter_map(Variable::ident).max()
    }

    /// Next free temporary suffix.
    #[must_use]
    pub fn next_temp_suffix(&self) -> u32 {
        self.vars
            .iter()
            .filter_map(|v| match v.kind {
                VarKind::Temp { suffix } => Some(suffix + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// All variables sharing the identity identifier of `id`, `id` included.
    #[must_use]
    pub fn group(&self, id: VarId) -> Vec<VarId> {
        match self[id].ident {
            Some(ident) => self
                .iter()
                .filter(|(_, v)| v.ident == Some(ident))
                .map(|(other, _)| other)
                .collect(),
            None => vec![id],
        }
    }
}

impl Index<VarId> for VarTable {
    type Output = Variable;

    fn index(&self, id: VarId) -> &Variable {
        &self.vars[id.0 as usize]
    }
}

impl IndexMut<VarId> for VarTable {
    fn index_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn identifiers_are_write_once() {
        let mut var = Variable::new(VarKind::Local { slot: 1 }, JType::Int);
        assert!(var.set_ident(4));
        assert!(!var.set_ident(9));
        assert_eq!(var.ident(), Some(4));
    }

    #[test]
    fn first_mutation_resets_value() {
        let mut var = Variable::new(VarKind::Local { slot: 1 }, JType::Int);
        var.value = Some(Expr::int(3));
        assert_eq!(var.known_value(), Some(&Expr::int(3)));
        assert!(var.mark_mutable());
        assert!(!var.mark_mutable());
        assert_eq!(var.value, None);
    }

    #[test]
    fn groups_follow_identifiers() {
        let mut vars = VarTable::new();
        let a = vars.push(Variable::new(VarKind::Local { slot: 1 }, JType::Int));
        let b = vars.push(Variable::new(VarKind::Local { slot: 1 }, JType::Int));
        let c = vars.push(Variable::new(VarKind::Temp { suffix: 2 }, JType::Int));
        vars[a].set_ident(0);
        vars[b].set_ident(0);

        assert_eq!(vars.group(a), vec![a, b]);
        assert_eq!(vars.group(c), vec![c]);
        assert_eq!(vars.max_ident(), Some(0));
        assert_eq!(vars.next_temp_suffix(), 3);
    }
}
