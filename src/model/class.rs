//! Class, field and method descriptors as reported by the class oracle.
//!
//! These are plain owned structures: a [`crate::model::ClassOracle`] hands them out behind an
//! [`Arc`](std::sync::Arc) and the reifier never mutates them. Annotations that steer the
//! reifier ([`Annotation`]) are part of the descriptors; there is no separate annotation oracle.

use std::sync::Arc;

use bitflags::bitflags;

use crate::{
    ast::Literal,
    model::{ConstantPool, JType, MethodDescriptor},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class, field and method access flags (`ACC_*`)
    pub struct AccessFlags: u16 {
        /// Accessible from everywhere
        const PUBLIC = 0x0001;
        /// Accessible only from the declaring class
        const PRIVATE = 0x0002;
        /// Accessible from subclasses and the package
        const PROTECTED = 0x0004;
        /// Member belongs to the class, not to instances
        const STATIC = 0x0008;
        /// Class can't be subclassed, method can't be overridden, field is assigned once
        const FINAL = 0x0010;
        /// Method body is wrapped in the receiver monitor
        const SYNCHRONIZED = 0x0020;
        /// Field is volatile
        const VOLATILE = 0x0040;
        /// Field is not serialized
        const TRANSIENT = 0x0080;
        /// Method is implemented outside of bytecode
        const NATIVE = 0x0100;
        /// Class is an interface
        const INTERFACE = 0x0200;
        /// Class or method is abstract
        const ABSTRACT = 0x0400;
        /// Compiler generated
        const SYNTHETIC = 0x1000;
    }
}

/// Reifier annotations attached to methods and classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// Method body is supplied as target language source
    Native {
        /// Body source text handed to the code generator
        source: String,
    },
    /// Method is implemented by an external symbol; only valid on static methods
    Foreign {
        /// Symbol the code generator links against
        symbol: String,
    },
    /// Method is expanded by a metaclass; only valid on public methods
    ///
    /// Without an explicit metaclass the metaclass hint of the declaring class is used.
    Intrinsic {
        /// Name of the registered metaclass
        metaclass: Option<String>,
    },
    /// Enables or disables inlining of call sites inside the annotated method
    Inline(bool),
    /// Request object inlining after the method was inlined into a caller
    InlineObjects,
    /// Class-level metaclass hint for intrinsic methods
    Metaclass(String),
}

impl Annotation {
    /// Returns `true` for annotations that replace the traced body.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Annotation::Native { .. } | Annotation::Foreign { .. } | Annotation::Intrinsic { .. }
        )
    }
}

/// Runtime code attribute of a method.
#[derive(Debug, Clone)]
pub struct MethodCode {
    /// Maximum operand stack depth in slots
    pub max_stack: u16,
    /// Number of local variable slots, parameters included
    pub max_locals: u16,
    /// Raw instruction stream
    pub code: Vec<u8>,
    /// Constant pool the instructions index into
    pub pool: Arc<ConstantPool>,
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: JType,
    /// Access flags
    pub flags: AccessFlags,
    /// Compile-time value of a `static final` field
    pub constant: Option<Literal>,
}

impl FieldInfo {
    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    /// Returns `true` for final fields.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(AccessFlags::FINAL)
    }
}

/// A declared method or constructor.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Method name, `<init>` for constructors
    pub name: String,
    /// Raw descriptor string
    pub descriptor: String,
    /// Parsed descriptor
    pub signature: MethodDescriptor,
    /// Access flags
    pub flags: AccessFlags,
    /// Reifier annotations
    pub annotations: Vec<Annotation>,
    /// Bytecode, absent for abstract and native methods
    pub code: Option<MethodCode>,
}

impl MethodInfo {
    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    /// Returns `true` for abstract methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(AccessFlags::ABSTRACT)
    }

    /// Returns `true` for native methods.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.flags.contains(AccessFlags::NATIVE)
    }

    /// Returns `true` for methods that can't be overridden.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags
            .intersects(AccessFlags::FINAL | AccessFlags::PRIVATE | AccessFlags::STATIC)
    }

    /// Returns `true` for public methods.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(AccessFlags::PUBLIC)
    }

    /// The terminal annotation replacing the traced body, if any.
    #[must_use]
    pub fn terminal(&self) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.is_terminal())
    }

    /// The inlining switch set on this method, if any.
    #[must_use]
    pub fn inline_hint(&self) -> Option<bool> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Inline(enabled) => Some(*enabled),
            _ => None,
        })
    }

    /// Returns `true` if object inlining was requested.
    #[must_use]
    pub fn inline_objects(&self) -> bool {
        self.annotations.contains(&Annotation::InlineObjects)
    }
}

/// A class or interface.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Internal name, e.g. `demo/Point`
    pub name: String,
    /// Superclass, `None` only for `java/lang/Object`
    pub super_class: Option<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Access flags
    pub flags: AccessFlags,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
    /// Declared methods
    pub methods: Vec<MethodInfo>,
    /// Class-level annotations
    pub annotations: Vec<Annotation>,
}

impl ClassInfo {
    /// Finds a declared method by name and descriptor.
    #[must_use]
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Finds a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(AccessFlags::INTERFACE)
    }

    /// Returns `true` for abstract classes and interfaces.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags
            .intersects(AccessFlags::ABSTRACT | AccessFlags::INTERFACE)
    }

    /// The class-level metaclass hint, if any.
    #[must_use]
    pub fn metaclass_hint(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Metaclass(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Reference counted class descriptor.
pub type ClassRc = Arc<ClassInfo>;

/// Handle of an object living in the host's static heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(pub u32);

/// A host heap object reachable from `static final` fields.
#[derive(Debug, Clone)]
pub struct HeapObject {
    /// Runtime class of the object
    pub class: String,
    /// Instance field values
    pub fields: Vec<(String, Literal)>,
}

impl HeapObject {
    /// Value of an instance field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Literal> {
        self.fields
            .iter()
            .find_map(|(field, value)| (field == name).then_some(value))
    }
}
