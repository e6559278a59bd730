//! Synthesis of capturing classes for lambda metafactory call sites.
//!
//! An `invokedynamic` instruction bootstrapped by the lambda metafactory creates an object of an
//! anonymous class implementing a functional interface. The reifier materializes that class:
//! one field per captured value, a constructor storing the captured values, and the single
//! interface method whose body forwards to the implementation method. The bodies are real
//! bytecode produced by the [`BytecodeAssembler`], so they are traced like any other method.

use log::debug;

use crate::{
    bytecode::{opcodes, BytecodeAssembler},
    model::{
        AccessFlags, ClassBuilder, ClassInfo, HandleKind, JType, LambdaBootstrap,
        MethodBuilder, MethodDescriptor, OBJECT_CLASS,
    },
    reify::ids::IdAllocator,
    Result,
};

/// Creates and collects the classes of lambda call sites.
#[derive(Debug, Default)]
pub struct LambdaFactory {
    counter: IdAllocator,
    pending: Vec<ClassInfo>,
}

impl LambdaFactory {
    /// Creates a factory with an empty class list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the classes synthesized since the last call.
    pub fn drain(&mut self) -> Vec<ClassInfo> {
        std::mem::take(&mut self.pending)
    }

    /// Synthesizes the class of one lambda call site and returns its name.
    ///
    /// The class is named `{owner}$$Lambda${n}` with a session-unique `n`. Its constructor
    /// takes the captured values in the order of the call site descriptor.
    ///
    /// # Arguments
    /// * `owner` - Class containing the `invokedynamic` instruction
    /// * `method` - Name of the functional interface method
    /// * `descriptor` - Call site descriptor, captured values in and interface type out
    /// * `bootstrap` - Decoded metafactory arguments
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] for unparsable descriptors and
    /// [`crate::Error::Malformed`] if the implementation method can't be adapted to the
    /// interface method.
    pub fn synthesize(
        &mut self,
        owner: &str,
        method: &str,
        descriptor: &str,
        bootstrap: &LambdaBootstrap,
    ) -> Result<String> {
        let site = MethodDescriptor::parse(descriptor)?;
        let Some(interface) = site.ret.class_name() else {
            return Err(malformed_error!(
                "Lambda call site {} does not produce an object",
                descriptor
            ));
        };

        let name = format!("{owner}$$Lambda${}", self.counter.next_id());
        let mut class = ClassBuilder::new(&name)
            .implements(interface)
            .flags(AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::SYNTHETIC);
        for (index, captured) in site.params.iter().enumerate() {
            class = class.field(
                &capture_field(index),
                captured.clone(),
                AccessFlags::PRIVATE | AccessFlags::FINAL,
            );
        }

        let class = class
            .method(constructor(&name, &site)?)
            .method(forwarder(&name, method, &site, bootstrap)?)
            .build()?;

        debug!(
            "Synthesized {} for {} via {}",
            name, interface, bootstrap.implementation
        );
        self.pending.push(class);
        Ok(name)
    }
}

fn capture_field(index: usize) -> String {
    format!("cap${index}")
}

fn constructor(class: &str, site: &MethodDescriptor) -> Result<MethodBuilder> {
    let descriptor = MethodDescriptor {
        params: site.params.clone(),
        ret: JType::Void,
    }
    .descriptor();

    let mut asm = BytecodeAssembler::new();
    asm.aload(0)?.invokespecial(OBJECT_CLASS, "<init>", "()V")?;
    let mut slot = 1_u16;
    for (index, captured) in site.params.iter().enumerate() {
        asm.aload(0)?
            .load(captured, slot)?
            .putfield(class, &capture_field(index), &captured.descriptor())?;
        slot += captured.slots() as u16;
    }
    asm.op(opcodes::RETURN)?;

    Ok(MethodBuilder::new("<init>", &descriptor).code(asm.into_code(slot)?))
}

fn forwarder(
    class: &str,
    method: &str,
    site: &MethodDescriptor,
    bootstrap: &LambdaBootstrap,
) -> Result<MethodBuilder> {
    let target = &bootstrap.implementation;
    let sam = MethodDescriptor::parse(&bootstrap.sam_descriptor)?;
    let implementation = MethodDescriptor::parse(&target.descriptor)?;

    let mut expected = Vec::new();
    if matches!(
        bootstrap.kind,
        HandleKind::InvokeVirtual | HandleKind::InvokeInterface | HandleKind::InvokeSpecial
    ) {
        expected.push(JType::object(&target.class));
    }
    expected.extend(implementation.params.iter().cloned());
    if expected.len() != site.params.len() + sam.params.len() {
        return Err(malformed_error!(
            "Lambda implementation {} takes {} values, call site provides {}",
            target,
            expected.len(),
            site.params.len() + sam.params.len()
        ));
    }

    let mut asm = BytecodeAssembler::new();
    if bootstrap.kind == HandleKind::NewInvokeSpecial {
        asm.new_object(&target.class)?.op(opcodes::DUP)?;
    }

    let mut expected = expected.iter();
    for (index, captured) in site.params.iter().enumerate() {
        asm.aload(0)?
            .getfield(class, &capture_field(index), &captured.descriptor())?;
        adapt(&mut asm, captured, expected.next())?;
    }
    let mut slot = 1_u16;
    for param in &sam.params {
        asm.load(param, slot)?;
        adapt(&mut asm, param, expected.next())?;
        slot += param.slots() as u16;
    }

    let produced = match bootstrap.kind {
        HandleKind::InvokeStatic => {
            asm.invokestatic(&target.class, &target.name, &target.descriptor)?;
            implementation.ret.clone()
        }
        HandleKind::InvokeVirtual => {
            asm.invokevirtual(&target.class, &target.name, &target.descriptor)?;
            implementation.ret.clone()
        }
        HandleKind::InvokeInterface => {
            asm.invokeinterface(&target.class, &target.name, &target.descriptor)?;
            implementation.ret.clone()
        }
        HandleKind::InvokeSpecial => {
            asm.invokespecial(&target.class, &target.name, &target.descriptor)?;
            implementation.ret.clone()
        }
        HandleKind::NewInvokeSpecial => {
            asm.invokespecial(&target.class, &target.name, &target.descriptor)?;
            JType::object(&target.class)
        }
    };

    match (&produced, &sam.ret) {
        (produced, JType::Void) => {
            match produced.slots() {
                0 => {}
                1 => {
                    asm.op(opcodes::POP)?;
                }
                _ => {
                    asm.op(opcodes::POP2)?;
                }
            }
            asm.op(opcodes::RETURN)?;
        }
        (produced, expected) => {
            adapt(&mut asm, produced, Some(expected))?;
            asm.return_value(expected)?;
        }
    }

    Ok(MethodBuilder::new(method, &bootstrap.sam_descriptor)
        .flags(AccessFlags::PUBLIC)
        .code(asm.into_code(slot)?))
}

/// Converts the value on top of the stack from `from` to `to`.
fn adapt(asm: &mut BytecodeAssembler, from: &JType, to: Option<&JType>) -> Result<()> {
    let Some(to) = to else {
        return Err(malformed_error!("Lambda argument without a parameter"));
    };
    if from == to {
        return Ok(());
    }

    match (from.is_primitive(), to.is_primitive()) {
        (false, false) => {
            if *to != JType::object(OBJECT_CLASS) {
                asm.checkcast(&class_operand(to))?;
            }
        }
        (true, false) => {
            let wrapper = wrapper_of(from)
                .ok_or_else(|| malformed_error!("No wrapper class for {}", from))?;
            asm.invokestatic(
                wrapper,
                "valueOf",
                &format!("({})L{wrapper};", from.descriptor()),
            )?;
        }
        (true, true) if from.stack_type() == to.stack_type() => {}
        _ => {
            return Err(malformed_error!(
                "Unsupported lambda adaptation from {} to {}",
                from,
                to
            ))
        }
    }
    Ok(())
}

fn class_operand(ty: &JType) -> String {
    match ty {
        JType::Reference(class) => class.clone(),
        other => other.descriptor(),
    }
}

fn wrapper_of(ty: &JType) -> Option<&'static str> {
    Some(match ty {
        JType::Int => "java/lang/Integer",
        JType::Long => "java/lang/Long",
        JType::Float => "java/lang/Float",
        JType::Double => "java/lang/Double",
        JType::Short => "java/lang/Short",
        JType::Byte => "java/lang/Byte",
        JType::Char => "java/lang/Character",
        JType::Boolean => "java/lang/Boolean",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MemberRef;

    #[test]
    fn capturing_static_lambda() {
        let mut factory = LambdaFactory::new();
        let bootstrap = LambdaBootstrap {
            implementation: MemberRef::new("demo/Main", "lambda$run$0", "(I)V"),
            kind: HandleKind::InvokeStatic,
            sam_descriptor: "()V".to_string(),
        };
        let name = factory
            .synthesize("demo/Main", "run", "(I)Ljava/lang/Runnable;", &bootstrap)
            .unwrap();
        assert_eq!(name, "demo/Main$$Lambda$0");

        let classes = factory.drain();
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.interfaces, vec!["java/lang/Runnable".to_string()]);
        assert_eq!(class.fields.len(), 1);
        assert!(class.method("<init>", "(I)V").is_some());
        let run = class.method("run", "()V").unwrap();
        let code = run.code.as_ref().unwrap();
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.code.last(), Some(&opcodes::RETURN));
        assert!(factory.drain().is_empty());
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut factory = LambdaFactory::new();
        let bootstrap = LambdaBootstrap {
            implementation: MemberRef::new("demo/Main", "lambda$0", "(II)I"),
            kind: HandleKind::InvokeStatic,
            sam_descriptor: "(I)I".to_string(),
        };
        assert!(factory
            .synthesize("demo/Main", "applyAsInt", "()Ljava/util/function/IntUnaryOperator;", &bootstrap)
            .is_err());
    }
}
