//! Fluent builders for class and method descriptors.
//!
//! Hosts that embed the reifier usually adapt their own metadata to [`ClassInfo`] directly. The
//! builders are the convenient way to describe small programs, and they are how the runtime
//! classes of [`crate::model::ClassPath`] and the lambda classes synthesized during a session are
//! put together.
//!
//! # Examples
//!
//! ```rust
//! use jreify::model::{AccessFlags, ClassBuilder, MethodBuilder};
//!
//! let class = ClassBuilder::new("demo/Counter")
//!     .field("count", jreify::model::JType::Int, AccessFlags::PRIVATE)
//!     .method(
//!         MethodBuilder::new("reset", "()V")
//!             .flags(AccessFlags::PUBLIC)
//!             .body(1, 1, vec![0xB1]),
//!     )
//!     .build()?;
//!
//! assert!(class.method("reset", "()V").is_some());
//! # Ok::<(), jreify::Error>(())
//! ```

use std::sync::Arc;

use crate::{
    ast::Literal,
    model::{
        AccessFlags, Annotation, ClassInfo, ConstantPool, FieldInfo, JType, MethodCode,
        MethodDescriptor, MethodInfo, OBJECT_CLASS,
    },
    Result,
};

/// Builder for [`MethodInfo`].
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    descriptor: String,
    flags: AccessFlags,
    annotations: Vec<Annotation>,
    code: Option<MethodCode>,
}

impl MethodBuilder {
    /// Starts a public method without code.
    #[must_use]
    pub fn new(name: &str, descriptor: &str) -> Self {
        MethodBuilder {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            flags: AccessFlags::PUBLIC,
            annotations: Vec::new(),
            code: None,
        }
    }

    /// Replaces the access flags.
    #[must_use]
    pub fn flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Adds a reifier annotation.
    #[must_use]
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Sets the code attribute.
    #[must_use]
    pub fn code(mut self, code: MethodCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets a code attribute that doesn't reference the constant pool.
    #[must_use]
    pub fn body(self, max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        self.code(MethodCode {
            max_stack,
            max_locals,
            code,
            pool: Arc::new(ConstantPool::new()),
        })
    }

    /// Builds the method descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if the method descriptor is malformed.
    pub fn build(self) -> Result<MethodInfo> {
        let signature = MethodDescriptor::parse(&self.descriptor)?;
        Ok(MethodInfo {
            name: self.name,
            descriptor: self.descriptor,
            signature,
            flags: self.flags,
            annotations: self.annotations,
            code: self.code,
        })
    }
}

/// Builder for [`ClassInfo`].
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    flags: AccessFlags,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodBuilder>,
    annotations: Vec<Annotation>,
}

impl ClassBuilder {
    /// Starts a public class extending `java/lang/Object`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassBuilder {
            name: name.to_string(),
            super_class: Some(OBJECT_CLASS.to_string()),
            interfaces: Vec::new(),
            flags: AccessFlags::PUBLIC,
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Sets the superclass.
    #[must_use]
    pub fn extends(mut self, super_class: &str) -> Self {
        self.super_class = Some(super_class.to_string());
        self
    }

    /// Removes the superclass, only meaningful for the root class.
    #[must_use]
    pub fn root(mut self) -> Self {
        self.super_class = None;
        self
    }

    /// Adds an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    /// Replaces the access flags.
    #[must_use]
    pub fn flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Adds a class-level annotation.
    #[must_use]
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: &str, ty: JType, flags: AccessFlags) -> Self {
        self.fields.push(FieldInfo {
            name: name.to_string(),
            ty,
            flags,
            constant: None,
        });
        self
    }

    /// Adds a `static final` field with a known value.
    #[must_use]
    pub fn constant(mut self, name: &str, ty: JType, value: Literal) -> Self {
        self.fields.push(FieldInfo {
            name: name.to_string(),
            ty,
            flags: AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
            constant: Some(value),
        });
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    /// Builds the class descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if a method descriptor is malformed.
    pub fn build(self) -> Result<ClassInfo> {
        let methods = self
            .methods
            .into_iter()
            .map(MethodBuilder::build)
            .collect::<Result<Vec<_>>>()?;

        Ok(ClassInfo {
            name: self.name,
            super_class: self.super_class,
            interfaces: self.interfaces,
            flags: self.flags,
            fields: self.fields,
            methods,
            annotations: self.annotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn builds_class_with_members() {
        let class = ClassBuilder::new("demo/Config")
            .annotation(Annotation::Metaclass("demo/Meta".to_string()))
            .constant("LIMIT", JType::Int, Literal::Int(8))
            .method(
                MethodBuilder::new("limit", "()I")
                    .flags(AccessFlags::PUBLIC | AccessFlags::STATIC)
                    .annotation(Annotation::Inline(false)),
            )
            .build()
            .unwrap();

        assert_eq!(class.super_class.as_deref(), Some(OBJECT_CLASS));
        assert_eq!(class.metaclass_hint(), Some("demo/Meta"));
        assert_eq!(class.field("LIMIT").unwrap().constant, Some(Literal::Int(8)));
        let limit = class.method("limit", "()I").unwrap();
        assert!(limit.is_static());
        assert_eq!(limit.inline_hint(), Some(false));
        assert!(limit.code.is_none());
    }

    #[test]
    fn rejects_bad_descriptor() {
        let result = ClassBuilder::new("demo/Bad")
            .method(MethodBuilder::new("f", "(Q)V"))
            .build();
        assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
    }
}
