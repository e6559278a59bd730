//! Per-class session records and virtual dispatch tables.

use std::fmt;

use crate::{ast::FunctionId, model::MemberRef};

/// Index of a [`Dispatcher`] in the session's dispatcher table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatcherId(pub u32);

/// Session record of a class reached during exploration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Internal class name
    pub class: String,
    /// Direct superclass
    pub super_class: Option<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Set once an instance of the class is created by traced code; never cleared
    pub instantiated: bool,
    /// Abstract classes and interfaces never receive dispatch entries
    pub is_abstract: bool,
    /// Registered classes that directly extend or implement this class
    pub subtypes: Vec<String>,
    /// Dispatchers keyed on this class as declared receiver type
    pub dispatchers: Vec<DispatcherId>,
    /// Metaclass used for intrinsic methods of this class
    pub metaclass: Option<String>,
}

/// The override set of a virtual call site.
///
/// One dispatcher exists per declared receiver type and method signature. Every instantiated
/// concrete subtype of the receiver type contributes one entry mapping it to the function
/// implementing the method for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatcher {
    /// Own index
    pub id: DispatcherId,
    /// Method as named at the call site; `method.class` is the declared receiver type
    pub method: MemberRef,
    /// Concrete subtypes and their implementations, in registration order
    pub entries: Vec<(String, FunctionId)>,
}

impl Dispatcher {
    /// The implementation registered for `class`.
    #[must_use]
    pub fn target(&self, class: &str) -> Option<FunctionId> {
        self.entries
            .iter()
            .find_map(|(entry, function)| (entry == class).then_some(*function))
    }

    /// Returns `true` if `class` already has an entry.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.target(class).is_some()
    }
}

impl fmt::Display for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatch d{} {} {{", self.id.0, self.method)?;
        for (class, function) in &self.entries {
            write!(f, " {} -> f{};", class.replace('/', "."), function.0)?;
        }
        write!(f, " }}")
    }
}
