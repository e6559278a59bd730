//! Expression nodes.
//!
//! Every node has a fixed set of child slots reachable by index ([`Expr::child`]) and a static
//! result type ([`Expr::ty`]). Rewriting passes use [`Expr::walk_mut`], which visits children
//! before their parent so a rewrite of the parent sees already-rewritten children.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use strum::{Display, EnumIter};

use crate::{
    ast::{DispatcherId, FunctionId, VarId, VarTable},
    model::{HeapRef, JType, MemberRef, CLASS_CLASS, STRING_CLASS},
};

/// Identity of one `new` instruction execution site within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NewSite(pub u32);

/// A compile-time constant.
#[derive(Debug, Clone)]
pub enum Literal {
    /// `int` and narrower
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// String constant
    String(String),
    /// Class literal, by internal name or array descriptor
    Class(String),
    /// `null`
    Null,
    /// An object of the host's static heap
    Object {
        /// Handle of the object
        heap: HeapRef,
        /// Runtime class of the object
        class: String,
    },
}

impl Literal {
    /// Static type of the literal.
    #[must_use]
    pub fn ty(&self) -> JType {
        match self {
            Literal::Int(_) => JType::Int,
            Literal::Long(_) => JType::Long,
            Literal::Float(_) => JType::Float,
            Literal::Double(_) => JType::Double,
            Literal::String(_) => JType::object(STRING_CLASS),
            Literal::Class(_) => JType::object(CLASS_CLASS),
            Literal::Null => JType::Null,
            Literal::Object { class, .. } => JType::object(class),
        }
    }

    /// Evaluates `self <op> other` for numeric and null literals.
    ///
    /// Returns `None` when the comparison can't be decided statically.
    #[must_use]
    pub fn compare(&self, op: CondOp, other: &Literal) -> Option<bool> {
        use std::cmp::Ordering;

        let ordering = match (self, other) {
            (Literal::Int(a), Literal::Int(b)) => a.cmp(b),
            (Literal::Long(a), Literal::Long(b)) => a.cmp(b),
            (Literal::Float(a), Literal::Float(b)) => a.partial_cmp(b)?,
            (Literal::Double(a), Literal::Double(b)) => a.partial_cmp(b)?,
            (Literal::Null, Literal::Null) => Ordering::Equal,
            (Literal::Object { heap: a, .. }, Literal::Object { heap: b, .. })
                if matches!(op, CondOp::Eq | CondOp::Ne) =>
            {
                return Some((a == b) == (op == CondOp::Eq));
            }
            (Literal::Object { .. }, Literal::Null) | (Literal::Null, Literal::Object { .. }) => {
                return match op {
                    CondOp::Eq => Some(false),
                    CondOp::Ne => Some(true),
                    _ => None,
                };
            }
            _ => return None,
        };

        Some(op.holds(ordering))
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Long(a), Literal::Long(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Double(a), Literal::Double(b)) => a.to_bits() == b.to_bits(),
            (Literal::String(a), Literal::String(b)) | (Literal::Class(a), Literal::Class(b)) => {
                a == b
            }
            (Literal::Null, Literal::Null) => true,
            (Literal::Object { heap: a, .. }, Literal::Object { heap: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Int(v) => v.hash(state),
            Literal::Long(v) => v.hash(state),
            Literal::Float(v) => v.to_bits().hash(state),
            Literal::Double(v) => v.to_bits().hash(state),
            Literal::String(v) | Literal::Class(v) => v.hash(state),
            Literal::Null => {}
            Literal::Object { heap, .. } => heap.hash(state),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Long(v) => write!(f, "{v}L"),
            Literal::Float(v) => write!(f, "{v}f"),
            Literal::Double(v) => write!(f, "{v}d"),
            Literal::String(v) => write!(f, "{v:?}"),
            Literal::Class(v) => write!(f, "{}.class", v.replace('/', ".")),
            Literal::Null => write!(f, "null"),
            Literal::Object { heap, class } => write!(f, "@{}#{}", class.replace('/', "."), heap.0),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BinaryOp {
    /// Addition
    #[strum(serialize = "+")]
    Add,
    /// Subtraction
    #[strum(serialize = "-")]
    Sub,
    /// Multiplication
    #[strum(serialize = "*")]
    Mul,
    /// Division
    #[strum(serialize = "/")]
    Div,
    /// Remainder
    #[strum(serialize = "%")]
    Rem,
    /// Left shift
    #[strum(serialize = "<<")]
    Shl,
    /// Arithmetic right shift
    #[strum(serialize = ">>")]
    Shr,
    /// Logical right shift
    #[strum(serialize = ">>>")]
    Ushr,
    /// Bitwise and
    #[strum(serialize = "&")]
    And,
    /// Bitwise or
    #[strum(serialize = "|")]
    Or,
    /// Bitwise xor
    #[strum(serialize = "^")]
    Xor,
    /// Three-way comparison of `long` values (`lcmp`)
    #[strum(serialize = "cmp")]
    Cmp,
    /// Three-way comparison, NaN compares as less (`fcmpl`, `dcmpl`)
    #[strum(serialize = "cmpl")]
    CmpL,
    /// Three-way comparison, NaN compares as greater (`fcmpg`, `dcmpg`)
    #[strum(serialize = "cmpg")]
    CmpG,
}

/// Comparison operators of conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CondOp {
    /// Equal
    #[strum(serialize = "==")]
    Eq,
    /// Not equal
    #[strum(serialize = "!=")]
    Ne,
    /// Less than
    #[strum(serialize = "<")]
    Lt,
    /// Greater or equal
    #[strum(serialize = ">=")]
    Ge,
    /// Greater than
    #[strum(serialize = ">")]
    Gt,
    /// Less or equal
    #[strum(serialize = "<=")]
    Le,
}

impl CondOp {
    /// The operator testing the opposite outcome.
    #[must_use]
    pub fn negate(self) -> CondOp {
        match self {
            CondOp::Eq => CondOp::Ne,
            CondOp::Ne => CondOp::Eq,
            CondOp::Lt => CondOp::Ge,
            CondOp::Ge => CondOp::Lt,
            CondOp::Gt => CondOp::Le,
            CondOp::Le => CondOp::Gt,
        }
    }

    /// Returns `true` if `ordering` of the left operand relative to the right satisfies `self`.
    #[must_use]
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            CondOp::Eq => ordering == Equal,
            CondOp::Ne => ordering != Equal,
            CondOp::Lt => ordering == Less,
            CondOp::Ge => ordering != Less,
            CondOp::Gt => ordering == Greater,
            CondOp::Le => ordering != Greater,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Primitive conversion to the node's type
    Convert,
    /// Type test, yields an `int` 0 or 1
    InstanceOf(JType),
    /// Checked reference cast
    CheckCast(JType),
    /// Array length
    ArrayLength,
}

/// The condition of a conditional branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Comparison operator
    pub op: CondOp,
    /// Left operand
    pub lhs: Expr,
    /// Right operand
    pub rhs: Expr,
}

impl Condition {
    /// The condition testing the opposite outcome.
    #[must_use]
    pub fn negate(&self) -> Condition {
        Condition {
            op: self.op.negate(),
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// A static or instance field access.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccess {
    /// Class named by the field reference
    pub owner: String,
    /// Field name
    pub name: String,
    /// Declared field type
    pub ty: JType,
    /// Object the field belongs to, `None` for static fields
    pub target: Option<Box<Expr>>,
}

/// How a method is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum InvokeKind {
    /// `invokestatic`
    #[strum(serialize = "static")]
    Static,
    /// `invokespecial`: constructors, private and super calls
    #[strum(serialize = "special")]
    Special,
    /// `invokevirtual`
    #[strum(serialize = "virtual")]
    Virtual,
    /// `invokeinterface`
    #[strum(serialize = "interface")]
    Interface,
}

/// What a call site was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callee {
    /// Not explored yet
    Unresolved,
    /// A single function
    Function(FunctionId),
    /// A virtual dispatch over all instantiated overrides
    Dispatcher(DispatcherId),
    /// No body is available (abstract or native without a terminal annotation)
    Opaque,
}

/// A method invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// The raw method reference of the call instruction
    pub method: MemberRef,
    /// Invocation kind
    pub kind: InvokeKind,
    /// Receiver, `None` for static calls and folded constructors
    pub receiver: Option<Expr>,
    /// Arguments in declaration order
    pub args: Vec<Expr>,
    /// Declared return type
    pub ret: JType,
    /// Resolution result
    pub callee: Callee,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant
    Literal(Literal),
    /// A variable read
    Var(VarId),
    /// A binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
        /// Result type
        ty: JType,
    },
    /// A unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
        /// Result type
        ty: JType,
    },
    /// A field read
    Field(FieldAccess),
    /// An array element read
    ArrayElem {
        /// Array reference
        array: Box<Expr>,
        /// Element index
        index: Box<Expr>,
        /// Element type
        ty: JType,
    },
    /// Object construction
    ///
    /// Without a constructor call this is the marker of an object under construction, which
    /// only exists on the abstract operand stack between `new` and `invokespecial <init>`.
    New {
        /// Allocation site
        site: NewSite,
        /// Instantiated class
        class: String,
        /// The folded constructor call; its receiver is implicit
        ctor: Option<Box<Call>>,
    },
    /// Array allocation
    NewArray {
        /// Type of the allocated array
        ty: JType,
        /// Dimension lengths, outermost first
        dims: Vec<Expr>,
    },
    /// A method call
    Call(Box<Call>),
}

impl Expr {
    /// Shorthand for an `int` literal.
    #[must_use]
    pub fn int(value: i32) -> Expr {
        Expr::Literal(Literal::Int(value))
    }

    /// Static result type of the expression.
    #[must_use]
    pub fn ty(&self, vars: &VarTable) -> JType {
        match self {
            Expr::Literal(literal) => literal.ty(),
            Expr::Var(var) => vars[*var].ty.clone(),
            Expr::Binary { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::ArrayElem { ty, .. }
            | Expr::NewArray { ty, .. } => ty.clone(),
            Expr::Field(field) => field.ty.clone(),
            Expr::New { class, .. } => JType::object(class),
            Expr::Call(call) => call.ret.clone(),
        }
    }

    /// The child slots of this node, in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Var(_) => Vec::new(),
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Field(field) => field.target.iter().map(AsRef::as_ref).collect(),
            Expr::ArrayElem { array, index, .. } => vec![array.as_ref(), index.as_ref()],
            Expr::New { ctor, .. } => ctor.iter().flat_map(|c| c.args.iter()).collect(),
            Expr::NewArray { dims, .. } => dims.iter().collect(),
            Expr::Call(call) => call.receiver.iter().chain(call.args.iter()).collect(),
        }
    }

    /// Mutable access to the child slots, in evaluation order.
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Literal(_) | Expr::Var(_) => Vec::new(),
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_mut(), rhs.as_mut()],
            Expr::Unary { operand, .. } => vec![operand.as_mut()],
            Expr::Field(field) => field.target.iter_mut().map(AsMut::as_mut).collect(),
            Expr::ArrayElem { array, index, .. } => vec![array.as_mut(), index.as_mut()],
            Expr::New { ctor, .. } => ctor.iter_mut().flat_map(|c| c.args.iter_mut()).collect(),
            Expr::NewArray { dims, .. } => dims.iter_mut().collect(),
            Expr::Call(call) => {
                let Call { receiver, args, .. } = call.as_mut();
                receiver.iter_mut().chain(args.iter_mut()).collect()
            }
        }
    }

    /// Number of child slots.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.children().len()
    }

    /// The child in slot `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&Expr> {
        self.children().get(index).copied()
    }

    /// Visits this node and all descendants, parents before children.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Visits all descendants and then this node, children before parents.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        for child in self.children_mut() {
            child.walk_mut(f);
        }
        f(self);
    }

    /// Returns `true` for literals and variable reads.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        matches!(self, Expr::Literal(_) | Expr::Var(_))
    }

    /// Returns `true` for an object under construction.
    #[must_use]
    pub fn is_new_marker(&self) -> bool {
        matches!(self, Expr::New { ctor: None, .. })
    }

    /// Returns `true` if evaluating the expression may have observable effects.
    ///
    /// Calls and allocations count as effects; reads and arithmetic don't.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        let mut effects = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Call(_) | Expr::New { .. } | Expr::NewArray { .. }) {
                effects = true;
            }
        });
        effects
    }

    /// Returns `true` if the expression reads `var`.
    #[must_use]
    pub fn uses_var(&self, var: VarId) -> bool {
        self.count_uses(var) > 0
    }

    /// Number of reads of `var`.
    #[must_use]
    pub fn count_uses(&self, var: VarId) -> usize {
        let mut count = 0;
        self.walk(&mut |e| {
            if *e == Expr::Var(var) {
                count += 1;
            }
        });
        count
    }

    /// Replaces every read of a variable with the result of `map`, if any.
    pub fn substitute(&mut self, map: &dyn Fn(VarId) -> Option<Expr>) {
        self.walk_mut(&mut |e| {
            if let Expr::Var(var) = e {
                if let Some(replacement) = map(*var) {
                    *e = replacement;
                }
            }
        });
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(receiver) = &self.receiver {
            write!(f, "{receiver}.")?;
        } else {
            write!(f, "{}.", self.method.class.replace('/', "."))?;
        }
        write!(f, "{}(", self.method.name)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")?;
        match self.callee {
            Callee::Function(id) => write!(f, " -> f{}", id.0),
            Callee::Dispatcher(id) => write!(f, " -> d{}", id.0),
            Callee::Opaque => write!(f, " -> ?"),
            Callee::Unresolved => Ok(()),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(f, "{literal}"),
            Expr::Var(var) => write!(f, "{var}"),
            Expr::Binary { op, lhs, rhs, .. } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Unary { op, operand, ty } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Convert => write!(f, "({ty}) {operand}"),
                UnaryOp::InstanceOf(class) => write!(f, "({operand} instanceof {class})"),
                UnaryOp::CheckCast(class) => write!(f, "(({class}) {operand})"),
                UnaryOp::ArrayLength => write!(f, "{operand}.length"),
            },
            Expr::Field(field) => match &field.target {
                Some(target) => write!(f, "{target}.{}", field.name),
                None => write!(f, "{}.{}", field.owner.replace('/', "."), field.name),
            },
            Expr::ArrayElem { array, index, .. } => write!(f, "{array}[{index}]"),
            Expr::New { site, class, ctor } => {
                write!(f, "new#{} {}(", site.0, class.replace('/', "."))?;
                if let Some(ctor) = ctor {
                    for (index, arg) in ctor.args.iter().enumerate() {
                        if index > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                }
                write!(f, ")")
            }
            Expr::NewArray { ty, dims } => {
                write!(f, "new {ty}")?;
                for dim in dims {
                    write!(f, "[{dim}]")?;
                }
                Ok(())
            }
            Expr::Call(call) => write!(f, "{call}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn literal_equality_uses_bits() {
        assert_eq!(Literal::Float(f32::NAN), Literal::Float(f32::NAN));
        assert_ne!(Literal::Double(0.0), Literal::Double(-0.0));
        assert_ne!(Literal::Int(1), Literal::Long(1));
    }

    #[test]
    fn literal_comparisons() {
        assert_eq!(Literal::Int(3).compare(CondOp::Lt, &Literal::Int(5)), Some(true));
        assert_eq!(Literal::Null.compare(CondOp::Eq, &Literal::Null), Some(true));
        assert_eq!(
            Literal::Double(f64::NAN).compare(CondOp::Eq, &Literal::Double(f64::NAN)),
            None
        );
        assert_eq!(Literal::Int(1).compare(CondOp::Eq, &Literal::Null), None);
    }

    #[test]
    fn negation_is_an_involution() {
        for op in CondOp::iter() {
            assert_eq!(op.negate().negate(), op);
            assert_ne!(op.negate(), op);
        }
    }

    #[test]
    fn child_slots() {
        let expr = Expr::Binary {
            op: BinaryOp::Mul,
            lhs: Box::new(Expr::Var(VarId(0))),
            rhs: Box::new(Expr::Var(VarId(0))),
            ty: JType::Int,
        };
        assert_eq!(expr.arity(), 2);
        assert_eq!(expr.child(1), Some(&Expr::Var(VarId(0))));
        assert_eq!(expr.child(2), None);
        assert_eq!(expr.count_uses(VarId(0)), 2);
        assert_eq!(expr.to_string(), "(v0 * v0)");
    }

    #[test]
    fn substitution_rewrites_reads() {
        let mut expr = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::Var(VarId(0))),
            rhs: Box::new(Expr::Var(VarId(1))),
            ty: JType::Int,
        };
        expr.substitute(&|var| (var == VarId(1)).then(|| Expr::int(7)));
        assert_eq!(expr.to_string(), "(v0 + 7)");
        assert!(!expr.has_side_effects());
    }
}
