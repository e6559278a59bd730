//! Splicing of callee bodies into their callers.
//!
//! Two strategies exist:
//!
//! * **Expression-like**: a callee whose whole body is `return e` is replaced by `e` with its
//!   parameters substituted by the arguments.
//! * **Statement-like**: a call that is a statement of its own (`f(..);` or `r = f(..);`) is
//!   replaced by a copy of the callee body. Callee variables are copied into the caller with
//!   identifiers above every identifier the caller uses, returns assign the result variable and
//!   jump to the end of the splice.
//!
//! Parameters are bound either by substitution or by an initializing assignment. An argument is
//! substituted if the parameter is never reassigned and the argument is an immutable variable,
//! a constant or a read of a final field. Expression-like inlining has no place for an
//! initializer; any other side-effect free argument read at most once is substituted only into
//! a callee expression that runs no call or allocation, so the read can't move past an effect.

use rustc_hash::FxHashMap;

use crate::{
    ast::{Body, Call, Expr, FieldAccess, Function, InlinedFunction, Stmt, VarId, VarKind, VarTable},
    model::ClassOracle,
};

/// How one parameter of an inlined callee is bound to its argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Binding {
    /// Every read of the parameter is replaced by this expression
    Substitute(Expr),
    /// The parameter becomes a variable initialized with the argument
    Initializer,
}

/// Receiver and arguments of a call, in parameter order.
pub(crate) fn call_arguments(call: &Call) -> Vec<&Expr> {
    call.receiver.iter().chain(call.args.iter()).collect()
}

/// Decides how `param` of `callee` is bound to `arg`.
pub(crate) fn bind(
    callee: &Function,
    param: VarId,
    arg: &Expr,
    caller: &VarTable,
    classes: &dyn ClassOracle,
) -> Binding {
    let reassigned = callee.vars[param].mutable || callee.vars.group(param).len() > 1;
    if reassigned {
        return Binding::Initializer;
    }
    match arg {
        Expr::Var(var) if !caller[*var].mutable => Binding::Substitute(arg.clone()),
        Expr::Literal(_) => Binding::Substitute(arg.clone()),
        Expr::Field(field) if is_final_read(field, caller, classes) => {
            Binding::Substitute(arg.clone())
        }
        _ => Binding::Initializer,
    }
}

fn is_final_read(field: &FieldAccess, caller: &VarTable, classes: &dyn ClassOracle) -> bool {
    let stable_target = match field.target.as_deref() {
        None | Some(Expr::Literal(_)) => true,
        Some(Expr::Var(var)) => !caller[*var].mutable,
        Some(_) => false,
    };
    stable_target
        && classes
            .resolve_field(&field.owner, &field.name)
            .is_ok_and(|resolved| resolved.field().is_final())
}

/// The returned expression of a callee whose body is a single `return e`.
fn single_return(body: &Body) -> Option<&Expr> {
    let mut stmts = body.stmts().filter(|s| !matches!(s, Stmt::Nop));
    match (stmts.next(), stmts.next()) {
        (Some(Stmt::Return(Some(expr))), None) => Some(expr),
        _ => None,
    }
}

/// Inlines a call as an expression.
///
/// Returns `None` if the callee body is not a single `return e`, or if an argument can't be
/// bound without duplicating or dropping side effects.
pub(crate) fn inline_expression(
    callee: &Function,
    call: &Call,
    caller: &VarTable,
    classes: &dyn ClassOracle,
) -> Option<Expr> {
    let expr = single_return(callee.body()?)?;
    let args = call_arguments(call);
    if args.len() != callee.params.len() {
        return None;
    }

    let mut reads_locals = false;
    expr.walk(&mut |e| {
        if let Expr::Var(var) = e {
            reads_locals |= !callee.params.contains(var);
        }
    });
    if reads_locals {
        return None;
    }

    let pure = !expr.has_side_effects();
    let mut substitutions: FxHashMap<VarId, Expr> = FxHashMap::default();
    for (param, arg) in callee.params.iter().zip(args) {
        let value = match bind(callee, *param, arg, caller, classes) {
            Binding::Substitute(value) => value,
            Binding::Initializer
                if pure && !arg.has_side_effects() && expr.count_uses(*param) <= 1 =>
            {
                arg.clone()
            }
            Binding::Initializer => return None,
        };
        substitutions.insert(*param, value);
    }

    let mut inlined = expr.clone();
    inlined.substitute(&|var| substitutions.get(&var).cloned());
    Some(inlined)
}

/// Copies every callee variable into the caller, returning the new id of each.
///
/// Identifiers are remapped consistently onto fresh values above the caller's maximum, and
/// temporaries receive fresh suffixes. Parameters become locals of the caller.
fn splice_vars(callee: &VarTable, caller: &mut VarTable) -> Vec<VarId> {
    let mut next_ident = caller.max_ident().map_or(0, |max| max + 1);
    let mut suffix = caller.next_temp_suffix();
    let mut idents: FxHashMap<u32, u32> = FxHashMap::default();

    let mut mapped = Vec::with_capacity(callee.len());
    for (_, var) in callee.iter() {
        let mut copy = var.clone();
        match copy.kind {
            VarKind::Temp { .. } => {
                copy.kind = VarKind::Temp { suffix };
                suffix += 1;
            }
            VarKind::Param { slot, .. } => copy.kind = VarKind::Local { slot },
            VarKind::Local { .. } => {}
        }
        let ident = var.ident().map(|old| {
            *idents.entry(old).or_insert_with(|| {
                let fresh = next_ident;
                next_ident += 1;
                fresh
            })
        });
        copy.reassign_ident(ident);
        mapped.push(caller.push(copy));
    }
    mapped
}

/// Inlines a call statement.
///
/// `result` is the caller variable receiving the return value, if the call's value is used.
/// Returns `None` if the callee has no traced body or the arity doesn't match.
pub(crate) fn inline_statement(
    callee: &Function,
    call: &Call,
    result: Option<VarId>,
    caller: &mut VarTable,
    classes: &dyn ClassOracle,
) -> Option<InlinedFunction> {
    let mut body = callee.body()?.clone();
    let args = call_arguments(call);
    if args.len() != callee.params.len() {
        return None;
    }
    let bindings: Vec<Binding> = callee
        .params
        .iter()
        .zip(&args)
        .map(|(param, arg)| bind(callee, *param, arg, caller, classes))
        .collect();

    let first_spliced = caller.len();
    let mapped = splice_vars(&callee.vars, caller);
    let rename = |var: VarId| mapped[var.0 as usize];
    for stmt in body.stmts_mut() {
        stmt.rename_vars(&rename);
    }

    let mut init = Vec::new();
    let mut substitutions: FxHashMap<VarId, Expr> = FxHashMap::default();
    for ((param, arg), binding) in callee.params.iter().zip(&args).zip(bindings) {
        let target = rename(*param);
        match binding {
            Binding::Substitute(value) => {
                substitutions.insert(target, value);
            }
            Binding::Initializer => init.push(Stmt::assign(target, (*arg).clone())),
        }
    }
    if !substitutions.is_empty() {
        for stmt in body.stmts_mut() {
            stmt.for_each_expr_mut(&mut |e| e.substitute(&|var| substitutions.get(&var).cloned()));
        }
    }

    let returns = body
        .stmts()
        .filter(|s| matches!(s, Stmt::Return(_)))
        .count();

    // A single `return x` of a spliced variable: let x's group be the result variable itself.
    let mut result_bound = false;
    if let (Some(result), 1) = (result, returns) {
        let returned = body.stmts().find_map(|s| match s {
            Stmt::Return(Some(Expr::Var(var))) => Some(*var),
            _ => None,
        });
        if let Some(returned) = returned.filter(|var| {
            var.0 as usize >= first_spliced && caller[*var].ty == caller[result].ty
        }) {
            let group: Vec<VarId> = caller
                .group(returned)
                .into_iter()
                .filter(|var| var.0 as usize >= first_spliced)
                .collect();
            let mutable = group.len() > 1 || group.iter().any(|var| caller[*var].mutable);
            let to_result = |var: VarId| if group.contains(&var) { result } else { var };
            for stmt in init.iter_mut().chain(body.stmts_mut()) {
                stmt.rename_vars(&to_result);
            }
            if mutable {
                caller[result].mark_mutable();
            }
            caller[result].value = None;
            result_bound = true;
        }
    }

    let exit = body.blocks.len();
    for block in &mut body.blocks {
        if !matches!(block.stmts.last(), Some(Stmt::Return(_))) {
            continue;
        }
        if let Some(Stmt::Return(value)) = block.stmts.pop() {
            match (value, result) {
                (Some(Expr::Var(var)), Some(result)) if result_bound && var == result => {}
                (Some(value), Some(result)) => block.push(Stmt::assign(result, value)),
                (Some(value), None) if value.has_side_effects() => block.push(Stmt::Eval(value)),
                _ => {}
            }
        }
        block.push(Stmt::Goto(exit));
    }
    if let Some(last) = body.blocks.iter_mut().rev().find(|b| !b.is_empty()) {
        if last.stmts.last() == Some(&Stmt::Goto(exit)) {
            last.stmts.pop();
        }
    }

    if let Some(result) = result {
        if !result_bound {
            caller[result].value = None;
            if returns > 1 {
                caller[result].mark_mutable();
            }
        }
    }

    Some(InlinedFunction {
        function: callee.id,
        init,
        body,
        result,
    })
}
