//! Host class model consumed by the reifier.
//!
//! This module describes everything the reifier reads but never produces: types and
//! descriptors ([`JType`], [`MethodDescriptor`]), constant pools, class/field/method descriptors
//! with their reifier annotations, and the [`ClassOracle`] through which they are looked up.
//!
//! # Key Components
//! - [`JType`] - Static type model
//! - [`ConstantPool`] - Constants and symbolic references used by method bytecode
//! - [`ClassInfo`] / [`MethodInfo`] / [`FieldInfo`] - Class descriptors
//! - [`ClassOracle`] - Read-only metadata oracle
//! - [`ClassPath`] - In-memory oracle with the minimal runtime classes
//! - [`ClassBuilder`] / [`MethodBuilder`] - Fluent descriptor construction

mod builder;
mod class;
mod constants;
mod oracle;
mod types;

pub use builder::{ClassBuilder, MethodBuilder};
pub use class::{
    AccessFlags, Annotation, ClassInfo, ClassRc, FieldInfo, HeapObject, HeapRef, MethodCode,
    MethodInfo,
};
pub use constants::{Constant, ConstantPool, HandleKind, LambdaBootstrap, MemberRef};
pub use oracle::{
    is_wrapper_class, ClassOracle, ClassPath, Overlay, ResolvedField, ResolvedMethod,
    WRAPPER_CLASSES,
};
pub use types::{JType, MethodDescriptor, CLASS_CLASS, OBJECT_CLASS, STRING_CLASS};
