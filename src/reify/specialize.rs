//! Argument facts and specialization keys.
//!
//! A call site's arguments are abstracted into [`Fact`]s. Two call sites with equal facts share
//! a specialization; a site whose facts are all [`Fact::Unknown`] uses the generic instance of
//! the callee.

use std::fmt;

use crate::{
    ast::{Expr, Function, Literal, NewSite, VarTable},
    model::{is_wrapper_class, MemberRef},
};

/// What is statically known about one argument of a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fact {
    /// Nothing is known
    Unknown,
    /// The argument is `null`
    Null,
    /// The argument is a constant
    Const(Literal),
    /// The argument is the object allocated at a known site
    New {
        /// Allocation site
        site: NewSite,
        /// Allocated class
        class: String,
    },
}

impl Fact {
    /// Derives the fact of an argument expression.
    ///
    /// Immutable variables are looked through to their compile-time value. Boxed wrapper
    /// objects of the host heap are treated as unknown so that boxed arguments don't multiply
    /// specializations.
    #[must_use]
    pub fn of(expr: &Expr, vars: &VarTable) -> Fact {
        match expr {
            Expr::Literal(Literal::Null) => Fact::Null,
            Expr::Literal(Literal::Object { class, .. }) if is_wrapper_class(class) => {
                Fact::Unknown
            }
            Expr::Literal(literal) => Fact::Const(literal.clone()),
            Expr::Var(var) => vars
                .get(*var)
                .and_then(|v| v.known_value())
                .filter(|value| !matches!(value, Expr::Var(_)))
                .map_or(Fact::Unknown, |value| Fact::of(value, vars)),
            Expr::New { site, class, .. } => Fact::New {
                site: *site,
                class: class.clone(),
            },
            _ => Fact::Unknown,
        }
    }

    /// Returns `true` unless the fact is [`Fact::Unknown`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Fact::Unknown)
    }

    /// The value a parameter bound to this fact is known to hold.
    #[must_use]
    pub fn to_value(&self) -> Option<Expr> {
        match self {
            Fact::Unknown => None,
            Fact::Null => Some(Expr::Literal(Literal::Null)),
            Fact::Const(literal) => Some(Expr::Literal(literal.clone())),
            Fact::New { site, class } => Some(Expr::New {
                site: *site,
                class: class.clone(),
                ctor: None,
            }),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fact::Unknown => write!(f, "?"),
            Fact::Null => write!(f, "null"),
            Fact::Const(literal) => write!(f, "{literal}"),
            Fact::New { site, class } => write!(f, "new {}@{}", class.replace('/', "."), site.0),
        }
    }
}

/// Identity of a specialization: the method together with the facts of its arguments,
/// receiver first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecKey {
    /// The specialized method
    pub method: MemberRef,
    /// One fact per argument slot, receiver first
    pub facts: Vec<Fact>,
}

impl SpecKey {
    /// Creates a key.
    #[must_use]
    pub fn new(method: MemberRef, facts: Vec<Fact>) -> Self {
        SpecKey { method, facts }
    }

    /// Which arguments carry a known fact.
    ///
    /// The cap on specializations is counted per method and mask, so a method called with
    /// many different constants at the same argument position stops specializing on that
    /// position without affecting others.
    #[must_use]
    pub fn mask(&self) -> Vec<bool> {
        self.facts.iter().map(Fact::is_known).collect()
    }

    /// Returns `true` if no fact is known.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.facts.iter().any(Fact::is_known)
    }
}

impl fmt::Display for SpecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.method)?;
        for (index, fact) in self.facts.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{fact}")?;
        }
        write!(f, "]")
    }
}

/// Records the facts of a specialization as compile-time values of its parameters.
///
/// Parameters that are reassigned in the body keep no value.
pub(crate) fn bind_facts(function: &mut Function, facts: &[Fact]) {
    for (param, fact) in function.params.iter().zip(facts) {
        let var = &mut function.vars[*param];
        if !var.mutable {
            var.value = fact.to_value();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{VarKind, Variable},
        model::{HeapRef, JType},
    };

    #[test]
    fn facts_look_through_immutable_variables() {
        let mut vars = VarTable::new();
        let mut var = Variable::new(VarKind::Local { slot: 0 }, JType::Int);
        var.value = Some(Expr::int(5));
        let known = vars.push(var);
        let mut var = Variable::new(VarKind::Local { slot: 1 }, JType::Int);
        var.value = Some(Expr::int(5));
        var.mark_mutable();
        let unknown = vars.push(var);

        assert_eq!(
            Fact::of(&Expr::Var(known), &vars),
            Fact::Const(Literal::Int(5))
        );
        assert_eq!(Fact::of(&Expr::Var(unknown), &vars), Fact::Unknown);
    }

    #[test]
    fn boxed_heap_objects_are_unknown() {
        let vars = VarTable::new();
        let boxed = Expr::Literal(Literal::Object {
            heap: HeapRef(0),
            class: "java/lang/Integer".to_string(),
        });
        let other = Expr::Literal(Literal::Object {
            heap: HeapRef(1),
            class: "demo/Config".to_string(),
        });
        assert_eq!(Fact::of(&boxed, &vars), Fact::Unknown);
        assert!(Fact::of(&other, &vars).is_known());
    }

    #[test]
    fn mask_marks_known_positions() {
        let key = SpecKey::new(
            MemberRef::new("demo/A", "f", "(II)I"),
            vec![Fact::Unknown, Fact::Const(Literal::Int(1))],
        );
        assert_eq!(key.mask(), vec![false, true]);
        assert!(!key.is_generic());
        assert_eq!(key.to_string(), "demo/A.f(II)I[?, 1]");
    }
}
