//! Fixtures shared by the unit tests.
//!
//! Method bodies are assembled with [`BytecodeAssembler`]; the closures passed to the helpers
//! use `?` on each instruction so the fixtures read like the bytecode they produce.

use crate::{
    bytecode::BytecodeAssembler,
    model::{AccessFlags, ClassBuilder, ClassPath, MethodBuilder, MethodCode, OBJECT_CLASS},
    Result,
};

/// Assembles a code attribute.
pub fn assemble(
    max_locals: u16,
    build: impl FnOnce(&mut BytecodeAssembler) -> Result<()>,
) -> MethodCode {
    let mut asm = BytecodeAssembler::new();
    build(&mut asm).unwrap();
    asm.into_code(max_locals).unwrap()
}

/// A public static method with assembled code.
pub fn static_method(
    name: &str,
    descriptor: &str,
    max_locals: u16,
    build: impl FnOnce(&mut BytecodeAssembler) -> Result<()>,
) -> MethodBuilder {
    MethodBuilder::new(name, descriptor)
        .flags(AccessFlags::PUBLIC | AccessFlags::STATIC)
        .code(assemble(max_locals, build))
}

/// A public instance method with assembled code.
pub fn virtual_method(
    name: &str,
    descriptor: &str,
    max_locals: u16,
    build: impl FnOnce(&mut BytecodeAssembler) -> Result<()>,
) -> MethodBuilder {
    MethodBuilder::new(name, descriptor)
        .flags(AccessFlags::PUBLIC)
        .code(assemble(max_locals, build))
}

/// A public no-argument constructor delegating to `super_class`.
pub fn default_constructor(super_class: &str) -> MethodBuilder {
    let super_class = super_class.to_string();
    MethodBuilder::new("<init>", "()V")
        .flags(AccessFlags::PUBLIC)
        .code(assemble(1, |asm| {
            asm.aload(0)?
                .invokespecial(&super_class, "<init>", "()V")?
                .op(crate::bytecode::opcodes::RETURN)?;
            Ok(())
        }))
}

/// A plain class extending `java/lang/Object` with a default constructor.
pub fn plain_class(name: &str) -> ClassBuilder {
    ClassBuilder::new(name).method(default_constructor(OBJECT_CLASS))
}

/// Builds all classes into a class path with the runtime classes.
pub fn class_path(classes: impl IntoIterator<Item = ClassBuilder>) -> ClassPath {
    let mut path = ClassPath::new();
    for class in classes {
        path.add(class.build().unwrap());
    }
    path
}
