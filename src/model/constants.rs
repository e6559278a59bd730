//! Method constant pools.
//!
//! The reifier consumes the subset of the class-file constant pool that method bodies reference:
//! numeric and string literals, class references, member references and `invokedynamic` call
//! sites. Entries are addressed with 1-based indices like in a class file; every entry occupies a
//! single index.

use std::fmt;

use crate::Result;

/// A symbolic reference to a field or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Internal name of the declaring (or referenced) class
    pub class: String,
    /// Member name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
}

impl MemberRef {
    /// Creates a new member reference.
    #[must_use]
    pub fn new(class: &str, name: &str, descriptor: &str) -> Self {
        MemberRef {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    /// Returns `true` for instance and static initializers.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class, self.name, self.descriptor)
    }
}

/// How a method handle invokes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// `REF_invokeStatic`
    InvokeStatic,
    /// `REF_invokeVirtual`
    InvokeVirtual,
    /// `REF_invokeSpecial`
    InvokeSpecial,
    /// `REF_invokeInterface`
    InvokeInterface,
    /// `REF_newInvokeSpecial`
    NewInvokeSpecial,
}

/// Bootstrap arguments of a `LambdaMetafactory.metafactory` call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LambdaBootstrap {
    /// The method implementing the lambda body
    pub implementation: MemberRef,
    /// How the implementation method is invoked
    pub kind: HandleKind,
    /// Erased descriptor of the functional interface method
    pub sam_descriptor: String,
}

/// A single constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// `CONSTANT_Integer`
    Integer(i32),
    /// `CONSTANT_Float`
    Float(f32),
    /// `CONSTANT_Long`
    Long(i64),
    /// `CONSTANT_Double`
    Double(f64),
    /// `CONSTANT_String`
    String(String),
    /// `CONSTANT_Class`, internal name or array descriptor
    Class(String),
    /// `CONSTANT_Fieldref`
    FieldRef(MemberRef),
    /// `CONSTANT_Methodref`
    MethodRef(MemberRef),
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethodRef(MemberRef),
    /// `CONSTANT_InvokeDynamic`
    ///
    /// `bootstrap` is only present for lambda metafactory call sites; other bootstraps are
    /// rejected by the interpreter.
    InvokeDynamic {
        /// Name of the functional interface method
        name: String,
        /// Call site descriptor: captured values in, functional interface out
        descriptor: String,
        /// Decoded lambda metafactory arguments
        bootstrap: Option<LambdaBootstrap>,
    },
}

/// An indexed constant pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        ConstantPool::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an entry, reusing an equal existing one, and returns its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] once the pool exceeds the 16 bit index space.
    pub fn intern(&mut self, constant: Constant) -> Result<u16> {
        if let Some(pos) = self.entries.iter().position(|entry| *entry == constant) {
            return index_of(pos);
        }
        self.entries.push(constant);
        index_of(self.entries.len() - 1)
    }

    /// Looks up an entry by its 1-based index.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for index 0 or an index past the end.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|pos| self.entries.get(pos))
            .ok_or_else(|| malformed_error!("Invalid constant pool index {}", index))
    }

    /// Resolves a `CONSTANT_Class` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    pub fn class(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name) => Ok(name),
            other => Err(malformed_error!(
                "Constant {} is not a class reference: {:?}",
                index,
                other
            )),
        }
    }

    /// Resolves a `CONSTANT_Fieldref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    pub fn field(&self, index: u16) -> Result<&MemberRef> {
        match self.get(index)? {
            Constant::FieldRef(member) => Ok(member),
            other => Err(malformed_error!(
                "Constant {} is not a field reference: {:?}",
                index,
                other
            )),
        }
    }

    /// Resolves a method or interface method reference.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    pub fn method(&self, index: u16) -> Result<&MemberRef> {
        match self.get(index)? {
            Constant::MethodRef(member) | Constant::InterfaceMethodRef(member) => Ok(member),
            other => Err(malformed_error!(
                "Constant {} is not a method reference: {:?}",
                index,
                other
            )),
        }
    }

    /// Iterates over `(index, entry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(pos, entry)| index_of(pos).ok().map(|index| (index, entry)))
    }
}

fn index_of(pos: usize) -> Result<u16> {
    u16::try_from(pos + 1).map_err(|_| malformed_error!("Constant pool overflow"))
}
