//! Object inlining for inlined splices.
//!
//! Inside a single-block splice, an object that is known by allocation site or by heap identity
//! and never escapes can have its fields kept in temporaries: every field read becomes a
//! temporary read, every field write a temporary assignment. A prologue loads the temporaries
//! and an epilogue stores written non-final fields back.
//!
//! The escape scan fails closed: any use of the object other than as the target of a field
//! access, including uses inside nested splices, disqualifies it.
//!
//! Fields are identified by their declaring class and name, so a subclass field shadowing a
//! superclass field of the same name gets its own temporary. Heap objects are only inlined when
//! every touched field is final, since their prologue values come from the host's heap and not
//! from the traced program.

use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    ast::{
        Expr, FieldAccess, InlinedFunction, LValue, Literal, Stmt, VarId, VarKind, VarTable,
        Variable,
    },
    model::{ClassOracle, HeapRef, JType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Candidate {
    Var(VarId),
    Heap(HeapRef),
}

/// A field identified by its declaring class and name.
type FieldKey = (String, String);

#[derive(Debug, Default)]
struct Usage {
    escaped: bool,
    fields: Vec<(FieldKey, JType)>,
    written: Vec<FieldKey>,
}

impl Usage {
    fn touch(&mut self, key: FieldKey, ty: &JType) {
        if !self.fields.iter().any(|(known, _)| *known == key) {
            self.fields.push((key, ty.clone()));
        }
    }
}

/// The declaring class and name of `field`, falling back to the referenced class when the
/// field doesn't resolve.
fn field_key(field: &FieldAccess, classes: &dyn ClassOracle) -> FieldKey {
    let owner = classes
        .resolve_field(&field.owner, &field.name)
        .map_or_else(|_| field.owner.clone(), |resolved| resolved.class.name.clone());
    (owner, field.name.clone())
}

/// Runs object inlining on a single-block splice.
///
/// Returns `true` if at least one object was inlined. Splices with more than one block are left
/// untouched.
pub fn inline_objects(
    inlined: &mut InlinedFunction,
    vars: &mut VarTable,
    classes: &dyn ClassOracle,
) -> bool {
    if inlined.body.blocks.len() != 1 {
        return false;
    }

    let mut usage: FxHashMap<Candidate, Usage> = FxHashMap::default();
    for stmt in &inlined.init {
        scan_stmt(stmt, vars, classes, &mut usage);
    }
    for stmt in &inlined.body.blocks[0].stmts {
        scan_stmt(stmt, vars, classes, &mut usage);
    }

    let defined_in_body: Vec<VarId> = inlined.body.blocks[0]
        .stmts
        .iter()
        .filter_map(Stmt::assigned_var)
        .collect();

    let mut candidates: Vec<(Candidate, Usage)> = usage
        .into_iter()
        .filter(|(candidate, usage)| {
            !usage.escaped
                && !usage.fields.is_empty()
                && !matches!(candidate, Candidate::Var(var) if defined_in_body.contains(var))
        })
        .collect();
    candidates.sort_by_key(|(candidate, _)| match candidate {
        Candidate::Var(var) => (0, var.0),
        Candidate::Heap(heap) => (1, heap.0),
    });

    let mut changed = false;
    for (candidate, usage) in candidates {
        if inline_object(inlined, vars, classes, candidate, &usage) {
            changed = true;
        }
    }
    changed
}

fn candidate_of(expr: &Expr, vars: &VarTable) -> Option<Candidate> {
    match expr {
        Expr::Literal(Literal::Object { heap, .. }) => Some(Candidate::Heap(*heap)),
        Expr::Var(var) => match vars.get(*var)?.known_value()? {
            Expr::New { .. } | Expr::Literal(Literal::Object { .. }) => Some(Candidate::Var(*var)),
            _ => None,
        },
        _ => None,
    }
}

fn scan_stmt(
    stmt: &Stmt,
    vars: &VarTable,
    classes: &dyn ClassOracle,
    usage: &mut FxHashMap<Candidate, Usage>,
) {
    match stmt {
        Stmt::Assign {
            target: LValue::Field(field),
            value,
        } => {
            match field.target.as_deref().and_then(|t| candidate_of(t, vars)) {
                Some(candidate) => {
                    let key = field_key(field, classes);
                    let entry = usage.entry(candidate).or_default();
                    entry.touch(key.clone(), &field.ty);
                    if !entry.written.contains(&key) {
                        entry.written.push(key);
                    }
                }
                None => {
                    if let Some(object) = &field.target {
                        scan_expr(object, vars, classes, usage);
                    }
                }
            }
            scan_expr(value, vars, classes, usage);
        }
        Stmt::Assign {
            target: LValue::Var(var),
            value,
        } if vars[*var].known_value() == Some(value) => {
            // The definition of a candidate; only its operands are uses.
            for child in value.children() {
                scan_expr(child, vars, classes, usage);
            }
        }
        other => other.for_each_expr(&mut |e| scan_expr(e, vars, classes, usage)),
    }
}

fn scan_expr(
    expr: &Expr,
    vars: &VarTable,
    classes: &dyn ClassOracle,
    usage: &mut FxHashMap<Candidate, Usage>,
) {
    if let Expr::Field(field) = expr {
        if let Some(candidate) = field.target.as_deref().and_then(|t| candidate_of(t, vars)) {
            usage
                .entry(candidate)
                .or_default()
                .touch(field_key(field, classes), &field.ty);
            return;
        }
    }
    if let Some(candidate) = candidate_of(expr, vars) {
        usage.entry(candidate).or_default().escaped = true;
        return;
    }
    for child in expr.children() {
        scan_expr(child, vars, classes, usage);
    }
}

fn inline_object(
    inlined: &mut InlinedFunction,
    vars: &mut VarTable,
    classes: &dyn ClassOracle,
    candidate: Candidate,
    usage: &Usage,
) -> bool {
    let object_expr = match candidate {
        Candidate::Var(var) => Expr::Var(var),
        Candidate::Heap(heap) => match classes.heap_object(heap) {
            Some(object) => Expr::Literal(Literal::Object {
                heap,
                class: object.class.clone(),
            }),
            None => return false,
        },
    };

    if matches!(candidate, Candidate::Heap(_))
        && (!usage.written.is_empty()
            || usage
                .fields
                .iter()
                .any(|((owner, name), _)| !is_final_field(classes, owner, name)))
    {
        debug!("objinline: {} has mutable fields, kept", object_expr);
        return false;
    }

    let mut initial = Vec::with_capacity(usage.fields.len());
    for ((owner, name), ty) in &usage.fields {
        let value = match candidate {
            Candidate::Heap(heap) => match classes.heap_object(heap).and_then(|o| o.field(name)) {
                Some(literal) => Expr::Literal(literal.clone()),
                None => return false,
            },
            Candidate::Var(_) => Expr::Field(FieldAccess {
                owner: owner.clone(),
                name: name.clone(),
                ty: ty.clone(),
                target: Some(Box::new(object_expr.clone())),
            }),
        };
        initial.push(value);
    }

    let mut suffix = vars.next_temp_suffix();
    let mut temps: Vec<(FieldKey, VarId)> = Vec::with_capacity(usage.fields.len());
    for ((key, ty), value) in usage.fields.iter().zip(initial) {
        let temp = vars.push(Variable::new(VarKind::Temp { suffix }, ty.clone()));
        suffix += 1;
        if usage.written.contains(key) {
            vars[temp].mark_mutable();
        }
        inlined.init.push(Stmt::assign(temp, value));
        temps.push((key.clone(), temp));
    }

    let temp_of = |field: &FieldAccess| {
        let key = field_key(field, classes);
        temps
            .iter()
            .find(|(known, _)| *known == key)
            .map(|(_, temp)| *temp)
    };
    let is_candidate = |target: &Option<Box<Expr>>| target.as_deref() == Some(&object_expr);

    for stmt in &mut inlined.body.blocks[0].stmts {
        let written = match &*stmt {
            Stmt::Assign {
                target: LValue::Field(field),
                ..
            } if is_candidate(&field.target) => temp_of(field),
            _ => None,
        };
        if let (Some(temp), Stmt::Assign { target, .. }) = (written, &mut *stmt) {
            *target = LValue::Var(temp);
        }
        stmt.for_each_expr_mut(&mut |e| {
            e.walk_mut(&mut |node| {
                let replacement = match node {
                    Expr::Field(field) if is_candidate(&field.target) => temp_of(field),
                    _ => None,
                };
                if let Some(temp) = replacement {
                    *node = Expr::Var(temp);
                }
            });
        });
    }

    let block = &mut inlined.body.blocks[0];
    for (key, ty) in &usage.fields {
        let (owner, name) = key;
        if !usage.written.contains(key) || is_final_field(classes, owner, name) {
            continue;
        }
        if let Some((_, temp)) = temps.iter().find(|(field, _)| field == key) {
            block.insert_before_terminator(Stmt::Assign {
                target: LValue::Field(FieldAccess {
                    owner: owner.clone(),
                    name: name.clone(),
                    ty: ty.clone(),
                    target: Some(Box::new(object_expr.clone())),
                }),
                value: Expr::Var(*temp),
            });
        }
    }

    debug!(
        "objinline: {} fields of {} kept in temporaries",
        temps.len(),
        object_expr
    );
    true
}

fn is_final_field(classes: &dyn ClassOracle, owner: &str, name: &str) -> bool {
    classes
        .resolve_field(owner, name)
        .is_ok_and(|resolved| resolved.field().is_final())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{Block, Body, FunctionId, NewSite},
        model::{AccessFlags, ClassBuilder, ClassPath},
    };

    fn point(classes: &mut ClassPath) {
        classes.add(
            ClassBuilder::new("demo/Point")
                .field("x", JType::Int, AccessFlags::PUBLIC)
                .field("y", JType::Int, AccessFlags::PUBLIC | AccessFlags::FINAL)
                .build()
                .unwrap(),
        );
    }

    fn field(object: VarId, name: &str) -> FieldAccess {
        FieldAccess {
            owner: "demo/Point".to_string(),
            name: name.to_string(),
            ty: JType::Int,
            target: Some(Box::new(Expr::Var(object))),
        }
    }

    fn allocated(vars: &mut VarTable) -> VarId {
        let mut var = Variable::new(VarKind::Local { slot: 1 }, JType::object("demo/Point"));
        var.value = Some(Expr::New {
            site: NewSite(0),
            class: "demo/Point".to_string(),
            ctor: None,
        });
        vars.push(var)
    }

    #[test]
    fn fields_move_into_temporaries() {
        let mut classes = ClassPath::new();
        point(&mut classes);
        let mut vars = VarTable::new();
        let p = allocated(&mut vars);
        let result = vars.push(Variable::new(VarKind::Local { slot: 2 }, JType::Int));

        let mut inlined = InlinedFunction {
            function: FunctionId(1),
            init: Vec::new(),
            body: Body::new(vec![Block::new(vec![
                Stmt::Assign {
                    target: LValue::Field(field(p, "x")),
                    value: Expr::Field(field(p, "y")),
                },
                Stmt::assign(result, Expr::Field(field(p, "x"))),
            ])]),
            result: Some(result),
        };

        assert!(inline_objects(&mut inlined, &mut vars, &classes));
        assert_eq!(inlined.init.len(), 2);
        let stmts = &inlined.body.blocks[0].stmts;
        assert!(matches!(
            &stmts[0],
            Stmt::Assign { target: LValue::Var(_), value: Expr::Var(_) }
        ));
        assert!(matches!(&stmts[1], Stmt::Assign { value: Expr::Var(_), .. }));
        // Only the non-final written field is stored back.
        assert_eq!(stmts.len(), 3);
        assert!(matches!(
            &stmts[2],
            Stmt::Assign { target: LValue::Field(f), .. } if f.name == "x"
        ));
    }

    /// A splice reading `x` and `y` of the heap object `heap`.
    fn reads_of_heap(heap: HeapRef, vars: &mut VarTable) -> InlinedFunction {
        let object = Expr::Literal(Literal::Object {
            heap,
            class: "demo/Point".to_string(),
        });
        let read = |name: &str| {
            Expr::Field(FieldAccess {
                owner: "demo/Point".to_string(),
                name: name.to_string(),
                ty: JType::Int,
                target: Some(Box::new(object.clone())),
            })
        };
        let result = vars.push(Variable::new(VarKind::Local { slot: 0 }, JType::Int));
        InlinedFunction {
            function: FunctionId(1),
            init: Vec::new(),
            body: Body::new(vec![Block::new(vec![Stmt::assign(
                result,
                Expr::Binary {
                    op: crate::ast::BinaryOp::Add,
                    lhs: Box::new(read("x")),
                    rhs: Box::new(read("y")),
                    ty: JType::Int,
                },
            )])]),
            result: Some(result),
        }
    }

    fn heap_point(classes: &mut ClassPath) -> HeapRef {
        classes.add_heap_object(crate::model::HeapObject {
            class: "demo/Point".to_string(),
            fields: vec![
                ("x".to_string(), Literal::Int(1)),
                ("y".to_string(), Literal::Int(2)),
            ],
        })
    }

    #[test]
    fn heap_object_with_mutable_field_is_kept() {
        let mut classes = ClassPath::new();
        point(&mut classes);
        let heap = heap_point(&mut classes);
        let mut vars = VarTable::new();
        let mut inlined = reads_of_heap(heap, &mut vars);
        let before = inlined.clone();

        assert!(!inline_objects(&mut inlined, &mut vars, &classes));
        assert_eq!(inlined, before);
    }

    #[test]
    fn heap_object_with_final_fields_is_inlined() {
        let mut classes = ClassPath::new();
        classes.add(
            ClassBuilder::new("demo/Point")
                .field("x", JType::Int, AccessFlags::PUBLIC | AccessFlags::FINAL)
                .field("y", JType::Int, AccessFlags::PUBLIC | AccessFlags::FINAL)
                .build()
                .unwrap(),
        );
        let heap = heap_point(&mut classes);
        let mut vars = VarTable::new();
        let mut inlined = reads_of_heap(heap, &mut vars);

        assert!(inline_objects(&mut inlined, &mut vars, &classes));
        let values: Vec<String> = inlined
            .init
            .iter()
            .map(|stmt| match stmt {
                Stmt::Assign { value, .. } => value.to_string(),
                other => panic!("unexpected prologue {other}"),
            })
            .collect();
        assert_eq!(values, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn shadowed_fields_get_separate_temporaries() {
        let mut classes = ClassPath::new();
        point(&mut classes);
        classes.add(
            ClassBuilder::new("demo/Point3")
                .extends("demo/Point")
                .field("x", JType::Int, AccessFlags::PUBLIC)
                .build()
                .unwrap(),
        );
        let mut vars = VarTable::new();
        let p = allocated(&mut vars);
        let result = vars.push(Variable::new(VarKind::Local { slot: 2 }, JType::Int));
        let shadowing = FieldAccess {
            owner: "demo/Point3".to_string(),
            ..field(p, "x")
        };

        let mut inlined = InlinedFunction {
            function: FunctionId(1),
            init: Vec::new(),
            body: Body::new(vec![Block::new(vec![
                Stmt::Assign {
                    target: LValue::Field(shadowing),
                    value: Expr::int(3),
                },
                Stmt::assign(result, Expr::Field(field(p, "x"))),
            ])]),
            result: Some(result),
        };

        assert!(inline_objects(&mut inlined, &mut vars, &classes));
        assert_eq!(inlined.init.len(), 2);
        let stmts = &inlined.body.blocks[0].stmts;
        let (
            Stmt::Assign {
                target: LValue::Var(written),
                ..
            },
            Stmt::Assign {
                value: Expr::Var(read),
                ..
            },
        ) = (&stmts[0], &stmts[1])
        else {
            panic!("fields were not replaced: {stmts:?}");
        };
        assert_ne!(written, read);
    }

    #[test]
    fn escaping_object_is_kept() {
        let mut classes = ClassPath::new();
        point(&mut classes);
        let mut vars = VarTable::new();
        let p = allocated(&mut vars);

        let mut inlined = InlinedFunction {
            function: FunctionId(1),
            init: Vec::new(),
            body: Body::new(vec![Block::new(vec![
                Stmt::Eval(Expr::Field(field(p, "x"))),
                Stmt::Return(Some(Expr::Var(p))),
            ])]),
            result: None,
        };

        assert!(!inline_objects(&mut inlined, &mut vars, &classes));
        assert!(inlined.init.is_empty());
    }
}
