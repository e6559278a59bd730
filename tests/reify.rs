//! Integration tests for complete reification sessions.
//!
//! Every test assembles a small class model with [`BytecodeAssembler`], reifies an entry method
//! and checks the shape of the snapshot.

use jreify::{
    bytecode::opcodes::*, model::OBJECT_CLASS, passes::eliminate_dead_code, prelude::*,
};

fn assemble(
    max_locals: u16,
    build: impl FnOnce(&mut BytecodeAssembler) -> Result<()>,
) -> Result<MethodCode> {
    let mut asm = BytecodeAssembler::new();
    build(&mut asm)?;
    asm.into_code(max_locals)
}

fn static_method(
    name: &str,
    descriptor: &str,
    max_locals: u16,
    build: impl FnOnce(&mut BytecodeAssembler) -> Result<()>,
) -> Result<MethodBuilder> {
    Ok(MethodBuilder::new(name, descriptor)
        .flags(AccessFlags::PUBLIC | AccessFlags::STATIC)
        .code(assemble(max_locals, build)?))
}

fn constructor(super_class: &str) -> Result<MethodBuilder> {
    Ok(MethodBuilder::new("<init>", "()V")
        .flags(AccessFlags::PUBLIC)
        .code(assemble(1, |asm| {
            asm.aload(0)?
                .invokespecial(super_class, "<init>", "()V")?
                .op(RETURN)?;
            Ok(())
        })?))
}

fn constant_returning(name: &str, value: i32) -> Result<MethodBuilder> {
    Ok(MethodBuilder::new(name, "()I")
        .flags(AccessFlags::PUBLIC)
        .code(assemble(1, |asm| {
            asm.iconst(value)?.op(IRETURN)?;
            Ok(())
        })?))
}

fn find_loop(function: &Function) -> Option<(usize, &Stmt, usize)> {
    let body = function.body()?;
    let (begin, stmt) = body.blocks.iter().enumerate().find_map(|(index, block)| {
        block
            .stmts
            .iter()
            .find(|s| matches!(s, Stmt::LoopBegin(_)))
            .map(|s| (index, s))
    })?;
    let end = body.stmts().find_map(|s| match s {
        Stmt::LoopEnd { header } => Some(*header),
        _ => None,
    })?;
    Some((begin, stmt, end))
}

/// `int square(int x) { return x * x; }` called as `square(5)`.
#[test]
fn square_of_constant_is_specialized() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(static_method("square", "(I)I", 1, |asm| {
                asm.iload(0)?.iload(0)?.op(IMUL)?.op(IRETURN)?;
                Ok(())
            })?)
            .method(static_method("main", "()I", 0, |asm| {
                asm.iconst(5)?
                    .invokestatic("demo/Main", "square", "(I)I")?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::with_config(&classes, ReifierConfig::no_inlining());
    reifier.reify_method("demo/Main", "main", "()I")?;
    let snapshot = reifier.snapshot()?;

    let square = MemberRef::new("demo/Main", "square", "(I)I");
    let functions: Vec<&Function> = snapshot.functions_of(&square).collect();
    assert_eq!(functions.len(), 1);
    let function = functions[0];
    assert!(function.spec.is_some());

    let stmts: Vec<&Stmt> = function.body().unwrap().stmts().collect();
    assert_eq!(stmts.len(), 1);
    let Stmt::Return(Some(Expr::Binary { lhs, rhs, .. })) = stmts[0] else {
        panic!("unexpected body {}", stmts[0]);
    };
    let (Expr::Var(a), Expr::Var(b)) = (lhs.as_ref(), rhs.as_ref()) else {
        panic!("operands are not variable reads");
    };
    assert_eq!(a, b);
    assert_eq!(*a, function.params[0]);
    assert_eq!(
        function.vars[*a].known_value(),
        Some(&Expr::Literal(Literal::Int(5)))
    );
    Ok(())
}

#[test]
fn square_of_constant_inlines_into_caller() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(
                static_method("square", "(I)I", 1, |asm| {
                    asm.iload(0)?.iload(0)?.op(IMUL)?.op(IRETURN)?;
                    Ok(())
                })?
                .annotation(Annotation::Inline(true)),
            )
            .method(static_method("main", "()I", 0, |asm| {
                asm.iconst(5)?
                    .invokestatic("demo/Main", "square", "(I)I")?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let id = reifier.reify_method("demo/Main", "main", "()I")?;
    let main = reifier.function(id).unwrap();

    let stmts: Vec<String> = main.body().unwrap().stmts().map(|s| s.to_string()).collect();
    assert_eq!(stmts, vec!["return (5 * 5);".to_string()]);
    assert_eq!(main.inline_depth, 1);
    Ok(())
}

/// `static int f(int x) { return bump() + x; }` called as `f(counter)`, where `bump`
/// increments the non-final `counter`.
#[test]
fn mutable_field_argument_keeps_its_evaluation_order() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .field("counter", JType::Int, AccessFlags::PUBLIC | AccessFlags::STATIC)
            .method(static_method("bump", "()I", 0, |asm| {
                asm.getstatic("demo/Main", "counter", "I")?
                    .iconst(1)?
                    .op(IADD)?
                    .op(DUP)?
                    .putstatic("demo/Main", "counter", "I")?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .method(
                static_method("f", "(I)I", 1, |asm| {
                    asm.invokestatic("demo/Main", "bump", "()I")?
                        .iload(0)?
                        .op(IADD)?
                        .op(IRETURN)?;
                    Ok(())
                })?
                .annotation(Annotation::Inline(true)),
            )
            .method(static_method("main", "()I", 0, |asm| {
                asm.getstatic("demo/Main", "counter", "I")?
                    .invokestatic("demo/Main", "f", "(I)I")?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let id = reifier.reify_method("demo/Main", "main", "()I")?;
    let main = reifier.function(id).unwrap();

    let stmts: Vec<&Stmt> = main.body().unwrap().stmts().collect();
    let [Stmt::Return(Some(Expr::Call(call)))] = stmts.as_slice() else {
        panic!("unexpected body {stmts:?}");
    };
    assert_eq!(call.method.name, "f");
    assert!(matches!(&call.args[..], [Expr::Field(field)] if field.name == "counter"));
    assert_eq!(main.inline_depth, 0);
    Ok(())
}

/// `if (false) return 1; return 2;`
#[test]
fn constant_false_branch_is_removed() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Flags")
            .constant("DEBUG", JType::Boolean, Literal::Int(0))
            .build()?,
    );
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(static_method("main", "()I", 0, |asm| {
                asm.getstatic("demo/Flags", "DEBUG", "Z")?
                    .branch(IFEQ, "else")?
                    .iconst(1)?
                    .op(IRETURN)?
                    .label("else")?
                    .iconst(2)?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let id = reifier.reify_method("demo/Main", "main", "()I")?;
    let snapshot = reifier.snapshot()?;
    let main = snapshot.function(id).unwrap();
    let body = main.body().unwrap();

    assert!(body.blocks[1].is_empty());
    assert!(body.stmts().all(|s| !s.jump_targets().contains(&1)));
    let returns: Vec<String> = body
        .stmts()
        .filter(|s| matches!(s, Stmt::Return(_)))
        .map(|s| s.to_string())
        .collect();
    assert_eq!(returns, vec!["return 2;".to_string()]);

    let mut again = body.clone();
    assert!(!eliminate_dead_code(&mut again, &main.vars));
    assert_eq!(&again, body);
    Ok(())
}

/// `int s = 0; for (int i = 0; i < n; i++) s += i; return s;` as laid out by javac.
#[test]
fn condition_first_loop_is_recovered() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(static_method("sum", "(I)I", 3, |asm| {
                asm.iconst(0)?
                    .istore(1)?
                    .iconst(0)?
                    .istore(2)?
                    .label("test")?
                    .iload(2)?
                    .iload(0)?
                    .branch(IF_ICMPGE, "end")?
                    .iload(1)?
                    .iload(2)?
                    .op(IADD)?
                    .istore(1)?
                    .iinc(2, 1)?
                    .goto("test")?
                    .label("end")?
                    .iload(1)?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let id = reifier.reify_method("demo/Main", "sum", "(I)I")?;
    let function = reifier.function(id).unwrap();

    let (begin, stmt, end) = find_loop(function).expect("loop was not recovered");
    assert_eq!(begin, end);
    let Stmt::LoopBegin(header) = stmt else {
        unreachable!()
    };
    let init = header.init.assigned_var().unwrap();
    let step = header.step.assigned_var().unwrap();
    assert_ne!(init, step);
    assert_eq!(function.vars[init].ident(), function.vars[step].ident());
    assert_eq!(header.cond.op, CondOp::Lt);
    Ok(())
}

/// The same loop as laid out by ecj, entered through a jump to the trailing condition.
#[test]
fn condition_last_loop_is_recovered() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(static_method("sum", "(I)I", 3, |asm| {
                asm.iconst(0)?
                    .istore(1)?
                    .iconst(0)?
                    .istore(2)?
                    .goto("test")?
                    .label("body")?
                    .iload(1)?
                    .iload(2)?
                    .op(IADD)?
                    .istore(1)?
                    .iinc(2, 1)?
                    .label("test")?
                    .iload(2)?
                    .iload(0)?
                    .branch(IF_ICMPLT, "body")?
                    .iload(1)?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let id = reifier.reify_method("demo/Main", "sum", "(I)I")?;
    let function = reifier.function(id).unwrap();

    let (begin, stmt, end) = find_loop(function).expect("loop was not recovered");
    assert_eq!(begin, end);
    let Stmt::LoopBegin(header) = stmt else {
        unreachable!()
    };
    assert_eq!(header.cond.op, CondOp::Lt);
    assert!(function
        .body()
        .unwrap()
        .stmts()
        .all(|s| !matches!(s, Stmt::Goto(_))));
    Ok(())
}

/// One call of `sink(i)` for every `i` up to one past the default cap.
#[test]
fn default_specialization_cap_falls_back_to_generic() -> Result<()> {
    let cap = ReifierConfig::default().max_specializations;
    assert_eq!(cap, 50);

    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(static_method("sink", "(I)V", 1, |asm| {
                asm.op(RETURN)?;
                Ok(())
            })?)
            .method(static_method("main", "()V", 0, |asm| {
                for value in 0..=cap as i32 {
                    asm.iconst(value)?
                        .invokestatic("demo/Main", "sink", "(I)V")?;
                }
                asm.op(RETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    reifier.reify_method("demo/Main", "main", "()V")?;
    let snapshot = reifier.snapshot()?;

    let sink = MemberRef::new("demo/Main", "sink", "(I)V");
    let functions: Vec<&Function> = snapshot.functions_of(&sink).collect();
    assert_eq!(functions.len(), cap + 1);
    let specialized = functions.iter().filter(|f| f.spec.is_some()).count();
    assert_eq!(specialized, cap);
    Ok(())
}

/// A virtual call on `B` with the instantiated overrides `B1` and `B2`.
#[test]
fn virtual_call_dispatches_over_instantiated_subtypes() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/B")
            .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .method(constructor(OBJECT_CLASS)?)
            .method(
                MethodBuilder::new("value", "()I")
                    .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT),
            )
            .build()?,
    );
    for (name, value) in [("demo/B1", 1), ("demo/B2", 2)] {
        classes.add(
            ClassBuilder::new(name)
                .extends("demo/B")
                .method(constructor("demo/B")?)
                .method(constant_returning("value", value)?)
                .build()?,
        );
    }
    // static int pick(B b) { return b.value(); }
    // static int main() { return pick(new B1()) + pick(new B2()); }
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(static_method("pick", "(Ldemo/B;)I", 1, |asm| {
                asm.aload(0)?
                    .invokevirtual("demo/B", "value", "()I")?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .method(static_method("main", "()I", 0, |asm| {
                for class in ["demo/B1", "demo/B2"] {
                    asm.new_object(class)?
                        .op(DUP)?
                        .invokespecial(class, "<init>", "()V")?
                        .invokestatic("demo/Main", "pick", "(Ldemo/B;)I")?;
                }
                asm.op(IADD)?.op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::with_config(&classes, ReifierConfig::no_inlining());
    reifier.reify_method("demo/Main", "main", "()I")?;
    let snapshot = reifier.snapshot()?;

    let dispatchers: Vec<&Dispatcher> = snapshot.dispatchers_of("demo/B").collect();
    assert_eq!(dispatchers.len(), 1);
    let dispatcher = dispatchers[0];
    assert_eq!(dispatcher.entries.len(), 2);
    assert!(dispatcher.contains("demo/B1"));
    assert!(dispatcher.contains("demo/B2"));

    let b = snapshot.type_def("demo/B").unwrap();
    assert_eq!(b.dispatchers, vec![dispatcher.id]);
    assert!(!b.instantiated);
    assert!(snapshot.type_def("demo/B1").unwrap().instantiated);

    for (class, value) in [("demo/B1", 1), ("demo/B2", 2)] {
        let target = snapshot.function(dispatcher.target(class).unwrap()).unwrap();
        assert_eq!(target.origin, MemberRef::new(class, "value", "()I"));
        let ret = target.body().unwrap().stmts().last().unwrap().to_string();
        assert_eq!(ret, format!("return {value};"));
    }

    let pick = MemberRef::new("demo/Main", "pick", "(Ldemo/B;)I");
    assert!(snapshot.functions_of(&pick).count() >= 1);
    for function in snapshot.functions_of(&pick) {
        let call = function
            .body()
            .unwrap()
            .stmts()
            .find_map(|s| match s {
                Stmt::Return(Some(Expr::Call(call))) => Some(call),
                _ => None,
            })
            .unwrap();
        assert_eq!(call.callee, Callee::Dispatcher(dispatcher.id));
    }
    Ok(())
}

/// `static int twice(int x) { int y = x + x; return y; }` inlined as a statement.
#[test]
fn inlined_locals_are_renamed() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(
                static_method("twice", "(I)I", 2, |asm| {
                    asm.iload(0)?
                        .iload(0)?
                        .op(IADD)?
                        .istore(1)?
                        .iload(1)?
                        .op(IRETURN)?;
                    Ok(())
                })?
                .annotation(Annotation::Inline(true)),
            )
            // static int main(int a) { int b = twice(a); return a + b; }
            .method(static_method("main", "(I)I", 2, |asm| {
                asm.iload(0)?
                    .invokestatic("demo/Main", "twice", "(I)I")?
                    .istore(1)?
                    .iload(0)?
                    .iload(1)?
                    .op(IADD)?
                    .op(IRETURN)?;
                Ok(())
            })?)
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let id = reifier.reify_method("demo/Main", "main", "(I)I")?;
    let main = reifier.function(id).unwrap();

    let inlined = main
        .body()
        .unwrap()
        .stmts()
        .find_map(|s| match s {
            Stmt::Inlined(inlined) => Some(inlined),
            _ => None,
        })
        .expect("call was not inlined");
    let result = inlined.result.unwrap();

    let param = main.params[0];
    let caller_ident = main.vars[param].ident();
    assert!(caller_ident.is_some());
    for stmt in inlined.init.iter().chain(inlined.body.stmts()) {
        if let Some(var) = stmt.assigned_var() {
            assert_ne!(main.vars[var].ident(), caller_ident);
            if var != result {
                assert_ne!(main.vars[var].ident(), main.vars[result].ident());
            }
        }
    }
    Ok(())
}

#[test]
fn stack_height_mismatch_fails_the_session() -> Result<()> {
    // iload_0; ifeq +4; iconst_1; iconst_2; ireturn
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(
                MethodBuilder::new("broken", "(I)I")
                    .flags(AccessFlags::PUBLIC | AccessFlags::STATIC)
                    .body(2, 1, vec![0x1A, 0x99, 0x00, 0x04, 0x04, 0x05, 0xAC]),
            )
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let err = reifier
        .reify_method("demo/Main", "broken", "(I)I")
        .unwrap_err();
    assert!(matches!(err, Error::Trace { .. }));
    assert!(matches!(
        err.root_cause(),
        Error::BadInstructionStream { .. }
    ));
    Ok(())
}

#[test]
fn unknown_entry_class_is_reported() {
    let classes = ClassPath::new();
    let mut reifier = Reifier::new(&classes);
    let err = reifier
        .reify_method("demo/Missing", "main", "()V")
        .unwrap_err();
    assert!(matches!(err, Error::ClassNotFound(name) if name == "demo/Missing"));
}

#[test]
fn entry_without_code_is_rejected() -> Result<()> {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("demo/Main")
            .method(
                MethodBuilder::new("main", "()V")
                    .flags(AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::NATIVE),
            )
            .build()?,
    );

    let mut reifier = Reifier::new(&classes);
    let err = reifier.reify_method("demo/Main", "main", "()V").unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
    Ok(())
}
