//! Reified functions.

use std::fmt;

use bitflags::bitflags;

use crate::{
    ast::{Body, VarId, VarKind, VarTable},
    model::{JType, MemberRef},
    reify::SpecKey,
};

/// Index of a [`Function`] in the session's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Properties of a reified function
    pub struct FunctionFlags: u8 {
        /// No receiver parameter
        const STATIC = 0x01;
        /// Cloned from the template with bound argument facts
        const SPECIALIZED = 0x02;
        /// The shared instance used when no facts are known or the cap is reached
        const GENERIC = 0x04;
        /// Object inlining runs after this function is inlined
        const INLINE_OBJECTS = 0x08;
        /// Declared by a class synthesized during the session
        const SYNTHETIC = 0x10;
    }
}

/// The implementation of a function.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// A body reified from bytecode
    Traced(Body),
    /// Target language source supplied by an annotation
    Native {
        /// Source text
        source: String,
    },
    /// An external symbol
    Foreign {
        /// Symbol name
        symbol: String,
    },
    /// Expanded by a metaclass during code generation
    Intrinsic {
        /// Name of the metaclass
        metaclass: String,
    },
}

/// A reified function.
///
/// Functions in the session table are published: once exploration of a function has finished
/// it is never modified again. Each specialization is a fresh copy of the method's template.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Own index
    pub id: FunctionId,
    /// Unique display name
    pub name: String,
    /// The method this function was reified from
    pub origin: MemberRef,
    /// Return type
    pub ret: JType,
    /// Parameter variables, receiver first for instance methods
    pub params: Vec<VarId>,
    /// Variable arena
    pub vars: VarTable,
    /// Implementation
    pub body: FunctionBody,
    /// Argument facts this instance was specialized on
    pub spec: Option<SpecKey>,
    /// `Inline(bool)` annotation of the origin method
    pub inline: Option<bool>,
    /// Deepest chain of inlined callees spliced into the body
    pub inline_depth: u32,
    /// Properties
    pub flags: FunctionFlags,
}

impl Function {
    /// The traced body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        match &self.body {
            FunctionBody::Traced(body) => Some(body),
            _ => None,
        }
    }

    /// Mutable access to the traced body.
    pub fn body_mut(&mut self) -> Option<&mut Body> {
        match &mut self.body {
            FunctionBody::Traced(body) => Some(body),
            _ => None,
        }
    }

    /// Returns `true` if the body is supplied by an annotation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self.body, FunctionBody::Traced(_))
    }

    /// Returns `true` for instance methods.
    #[must_use]
    pub fn has_receiver(&self) -> bool {
        !self.flags.contains(FunctionFlags::STATIC)
    }

    /// Variables that are neither parameters nor temporaries.
    #[must_use]
    pub fn locals(&self) -> Vec<VarId> {
        self.vars
            .iter()
            .filter(|(_, v)| matches!(v.kind, VarKind::Local { .. }))
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of statements of the traced body, zero for terminal functions.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.body().map_or(0, Body::statement_count)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.ret, self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {param}", self.vars[*param].ty)?;
        }
        write!(f, ")")?;
        match &self.body {
            FunctionBody::Native { source } => write!(f, " native {source:?}"),
            FunctionBody::Foreign { symbol } => write!(f, " foreign {symbol}"),
            FunctionBody::Intrinsic { metaclass } => write!(f, " intrinsic {metaclass}"),
            FunctionBody::Traced(body) => {
                writeln!(f, " {{")?;
                for (index, block) in body.blocks.iter().enumerate() {
                    if block.is_empty() {
                        continue;
                    }
                    writeln!(f, "  B{index}: ({} in)", block.incoming)?;
                    for stmt in &block.stmts {
                        writeln!(f, "    {stmt}")?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}
