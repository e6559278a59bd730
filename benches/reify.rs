//! Benchmarks for bytecode partitioning and complete reification sessions.
//!
//! - Block partitioning of a loop with a switch
//! - A session over a counted loop (tracing, identity resolution, loop recovery)
//! - A session with specialization, dispatch and inlining

extern crate jreify;

use criterion::{criterion_group, criterion_main, Criterion};
use jreify::{bytecode::decode_blocks, bytecode::opcodes::*, model::OBJECT_CLASS, prelude::*};
use std::hint::black_box;

fn static_method(
    name: &str,
    descriptor: &str,
    max_locals: u16,
    build: impl FnOnce(&mut BytecodeAssembler) -> Result<()>,
) -> MethodBuilder {
    let mut asm = BytecodeAssembler::new();
    build(&mut asm).unwrap();
    MethodBuilder::new(name, descriptor)
        .flags(AccessFlags::PUBLIC | AccessFlags::STATIC)
        .code(asm.into_code(max_locals).unwrap())
}

/// `for (int i = 0; i < n; i++) switch (i & 3) { ... }`
fn loop_with_switch() -> MethodBuilder {
    static_method("mix", "(I)I", 3, |asm| {
        asm.iconst(0)?
            .istore(1)?
            .iconst(0)?
            .istore(2)?
            .label("test")?
            .iload(2)?
            .iload(0)?
            .branch(IF_ICMPGE, "end")?
            .iload(2)?
            .iconst(3)?
            .op(IAND)?
            .tableswitch(0, &["c0", "c1", "c2"], "next")?
            .label("c0")?
            .iinc(1, 1)?
            .goto("next")?
            .label("c1")?
            .iinc(1, 2)?
            .goto("next")?
            .label("c2")?
            .iload(1)?
            .iload(2)?
            .op(IADD)?
            .istore(1)?
            .label("next")?
            .iinc(2, 1)?
            .goto("test")?
            .label("end")?
            .iload(1)?
            .op(IRETURN)?;
        Ok(())
    })
}

fn loop_classes() -> ClassPath {
    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("bench/Loop")
            .method(loop_with_switch())
            .build()
            .unwrap(),
    );
    classes
}

/// Two shape subclasses, a virtual call and a chain of small static helpers.
fn dispatch_classes() -> ClassPath {
    let ctor = |super_class: &str| {
        let mut asm = BytecodeAssembler::new();
        asm.aload(0)
            .unwrap()
            .invokespecial(super_class, "<init>", "()V")
            .unwrap()
            .op(RETURN)
            .unwrap();
        MethodBuilder::new("<init>", "()V")
            .flags(AccessFlags::PUBLIC)
            .code(asm.into_code(1).unwrap())
    };
    let area = |value: i32| {
        let mut asm = BytecodeAssembler::new();
        asm.iconst(value).unwrap().op(IRETURN).unwrap();
        MethodBuilder::new("area", "()I")
            .flags(AccessFlags::PUBLIC)
            .code(asm.into_code(1).unwrap())
    };

    let mut classes = ClassPath::new();
    classes.add(
        ClassBuilder::new("bench/Shape")
            .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .method(ctor(OBJECT_CLASS))
            .method(
                MethodBuilder::new("area", "()I")
                    .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT),
            )
            .build()
            .unwrap(),
    );
    for (name, value) in [("bench/Square", 4), ("bench/Circle", 3)] {
        classes.add(
            ClassBuilder::new(name)
                .extends("bench/Shape")
                .method(ctor("bench/Shape"))
                .method(area(value))
                .build()
                .unwrap(),
        );
    }
    classes.add(
        ClassBuilder::new("bench/Main")
            .method(static_method("scale", "(II)I", 2, |asm| {
                asm.iload(0)?.iload(1)?.op(IMUL)?.op(IRETURN)?;
                Ok(())
            }))
            .method(static_method("measure", "(Lbench/Shape;I)I", 2, |asm| {
                asm.aload(0)?
                    .invokevirtual("bench/Shape", "area", "()I")?
                    .iload(1)?
                    .invokestatic("bench/Main", "scale", "(II)I")?
                    .op(IRETURN)?;
                Ok(())
            }))
            .method(static_method("main", "()I", 0, |asm| {
                for (index, class) in ["bench/Square", "bench/Circle"].iter().enumerate() {
                    asm.new_object(class)?
                        .op(DUP)?
                        .invokespecial(class, "<init>", "()V")?
                        .iconst(index as i32 + 2)?
                        .invokestatic("bench/Main", "measure", "(Lbench/Shape;I)I")?;
                }
                asm.op(IADD)?.op(IRETURN)?;
                Ok(())
            }))
            .build()
            .unwrap(),
    );
    classes
}

fn bench_decode_blocks(c: &mut Criterion) {
    let method = loop_with_switch().build().unwrap();
    let code = method.code.unwrap().code;

    c.bench_function("decode_blocks_loop_switch", |b| {
        b.iter(|| {
            let blocks = decode_blocks(black_box(&code)).unwrap();
            black_box(blocks)
        });
    });
}

fn bench_reify_loop(c: &mut Criterion) {
    let classes = loop_classes();

    c.bench_function("reify_loop_switch", |b| {
        b.iter(|| {
            let mut reifier = Reifier::new(&classes);
            let id = reifier.reify_method("bench/Loop", "mix", "(I)I").unwrap();
            black_box(id)
        });
    });
}

fn bench_reify_dispatch(c: &mut Criterion) {
    let classes = dispatch_classes();

    c.bench_function("reify_dispatch_inline", |b| {
        b.iter(|| {
            let config = ReifierConfig::new().with_inlining(true, 64);
            let mut reifier = Reifier::with_config(&classes, config);
            reifier.reify_method("bench/Main", "main", "()I").unwrap();
            black_box(reifier.snapshot().unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_decode_blocks,
    bench_reify_loop,
    bench_reify_dispatch,
);
criterion_main!(benches);
