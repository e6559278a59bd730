//! Call graph exploration.
//!
//! The [`Tracer`] owns the session tables. Exploring a function walks every expression of its
//! body, arguments before the call consuming them, and resolves each call site:
//!
//! * static, special and final calls resolve to a function specialized on the argument facts,
//!   or to the generic function once no fact is known or the cap is reached;
//! * other virtual and interface calls resolve to the [`Dispatcher`] of the declared receiver
//!   type, whose entries are the generic functions of all instantiated concrete subtypes;
//! * methods carrying a terminal annotation become terminal functions without a traced body;
//! * methods without code become opaque.
//!
//! Functions are reserved before they are explored and published once exploration finishes,
//! which makes recursion terminate: a call reaching a reserved function resolves to it without
//! exploring it again.
//!
//! Inlining is switched by an inherited context. A callee's `Inline(bool)` annotation decides
//! whether its call sites are inlined and becomes the context its own body is explored with;
//! callees without the annotation inherit the context of their caller. The entry method starts
//! from [`ReifierConfig::inline_by_default`].

use std::collections::BTreeSet;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::{
    ast::{
        Body, Call, Callee, Dispatcher, DispatcherId, Expr, Function, FunctionBody, FunctionFlags,
        FunctionId, InvokeKind, LValue, Literal, Stmt, TypeDef, VarTable,
    },
    config::ReifierConfig,
    model::{
        AccessFlags, Annotation, ClassInfo, ClassOracle, HeapRef, MemberRef, Overlay,
        ResolvedMethod,
    },
    passes::{eliminate_dead_code, inline_objects, BodyPass, DeadCodePass, LoopRecoveryPass},
    reify::{
        ids::IdAllocator,
        inliner::{self, call_arguments},
        lambda::LambdaFactory,
        metaclass::Metaclass,
        method::{parameter_vars, MethodTracer, TracedMethod},
        specialize::{bind_facts, Fact, SpecKey},
    },
    Error, Result,
};

/// Session tables and the exploration driver.
pub(crate) struct Tracer<'a> {
    pub config: ReifierConfig,
    pub classes: Overlay<'a>,
    pub metaclasses: FxHashMap<String, Box<dyn Metaclass>>,
    /// Function table; `None` while a reserved function is explored
    pub functions: Vec<Option<Function>>,
    pub types: FxHashMap<String, TypeDef>,
    /// Registration order of `types`
    pub type_order: Vec<String>,
    pub dispatchers: Vec<Dispatcher>,
    pub heap: BTreeSet<HeapRef>,
    dispatcher_index: FxHashMap<MemberRef, DispatcherId>,
    /// Inline context each dispatcher was created under, indexed by [`DispatcherId`]
    dispatcher_inline: Vec<bool>,
    templates: FxHashMap<MemberRef, TracedMethod>,
    specializations: FxHashMap<SpecKey, FunctionId>,
    shape_counts: FxHashMap<(MemberRef, Vec<bool>), usize>,
    generics: FxHashMap<MemberRef, FunctionId>,
    terminals: FxHashMap<MemberRef, FunctionId>,
    sites: IdAllocator,
    lambdas: LambdaFactory,
    depth: usize,
}

impl<'a> Tracer<'a> {
    pub fn new(classes: &'a dyn ClassOracle, config: ReifierConfig) -> Self {
        Tracer {
            config,
            classes: Overlay::new(classes),
            metaclasses: FxHashMap::default(),
            functions: Vec::new(),
            types: FxHashMap::default(),
            type_order: Vec::new(),
            dispatchers: Vec::new(),
            heap: BTreeSet::new(),
            dispatcher_index: FxHashMap::default(),
            dispatcher_inline: Vec::new(),
            templates: FxHashMap::default(),
            specializations: FxHashMap::default(),
            shape_counts: FxHashMap::default(),
            generics: FxHashMap::default(),
            terminals: FxHashMap::default(),
            sites: IdAllocator::new(),
            lambdas: LambdaFactory::new(),
            depth: 0,
        }
    }

    /// Returns the function implementing `resolved` for a call site with `facts`.
    ///
    /// `inherited` is the inline context of the call site. A newly instantiated function is
    /// explored with it unless the method carries its own `Inline` annotation.
    ///
    /// `None` means the method has neither code nor a terminal annotation and calls to it stay
    /// opaque.
    pub fn function_for(
        &mut self,
        resolved: &ResolvedMethod,
        mut facts: Vec<Fact>,
        inherited: bool,
    ) -> Result<Option<FunctionId>> {
        let method = resolved.method();
        let origin = MemberRef::new(&resolved.class.name, &method.name, &method.descriptor);

        if let Some(annotation) = method.terminal() {
            return self.terminal(resolved, origin, annotation.clone()).map(Some);
        }
        if method.code.is_none() {
            trace!("{} has no code, calls stay opaque", origin);
            return Ok(None);
        }

        let inline = method.inline_hint().unwrap_or(inherited);
        let arity = usize::from(!method.is_static()) + method.signature.params.len();
        facts.resize(arity, Fact::Unknown);
        if !facts.iter().any(Fact::is_known) {
            return self.generic(resolved, origin, inline).map(Some);
        }

        let key = SpecKey::new(origin.clone(), facts);
        if let Some(id) = self.specializations.get(&key) {
            return Ok(Some(*id));
        }

        let count = self
            .shape_counts
            .entry((origin.clone(), key.mask()))
            .or_insert(0);
        if *count >= self.config.max_specializations {
            debug!(
                "Specialization cap of {} reached for {}, using the generic function",
                self.config.max_specializations, origin
            );
            return self.generic(resolved, origin, inline).map(Some);
        }
        *count += 1;

        let id = self.reserve();
        self.specializations.insert(key.clone(), id);
        self.instantiate(resolved, origin, id, Some(key), inline)?;
        Ok(Some(id))
    }

    /// Re-populates all dispatchers until no class becomes instantiated and no dispatcher
    /// grows anymore.
    pub fn saturate(&mut self) -> Result<()> {
        let mut rounds = 0;
        loop {
            let before = self.progress();
            let mut index = 0;
            while index < self.dispatchers.len() {
                self.populate(DispatcherId(index as u32))?;
                index += 1;
            }
            rounds += 1;
            if self.progress() == before {
                break;
            }
        }
        debug!(
            "Dispatcher fixpoint reached after {} rounds: {} dispatchers, {} functions",
            rounds,
            self.dispatchers.len(),
            self.functions.len()
        );
        Ok(())
    }

    /// Registers a class, its superclass and its interfaces.
    ///
    /// # Errors
    /// Returns [`Error::ClassNotFound`] for unknown classes and [`Error::AmbiguousMetaclass`]
    /// if the supertypes carry conflicting metaclass hints.
    pub fn register_class(&mut self, name: &str) -> Result<()> {
        if self.types.contains_key(name) {
            return Ok(());
        }
        let info = self.classes.require(name)?;
        let metaclass = self.resolve_metaclass(&info)?;
        let supertypes: Vec<String> = info
            .super_class
            .iter()
            .chain(info.interfaces.iter())
            .cloned()
            .collect();

        self.types.insert(
            name.to_string(),
            TypeDef {
                class: name.to_string(),
                super_class: info.super_class.clone(),
                interfaces: info.interfaces.clone(),
                instantiated: false,
                is_abstract: info.is_abstract() || info.is_interface(),
                subtypes: Vec::new(),
                dispatchers: Vec::new(),
                metaclass,
            },
        );
        self.type_order.push(name.to_string());
        trace!("Registered class {}", name);

        for supertype in supertypes {
            self.register_class(&supertype)?;
            if let Some(record) = self.types.get_mut(&supertype) {
                if !record.subtypes.iter().any(|s| s == name) {
                    record.subtypes.push(name.to_string());
                }
            }
        }
        Ok(())
    }

    fn progress(&self) -> (usize, usize, usize) {
        let instantiated = self.types.values().filter(|t| t.instantiated).count();
        let entries = self.dispatchers.iter().map(|d| d.entries.len()).sum();
        (instantiated, entries, self.dispatchers.len())
    }

    fn reserve(&mut self) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(None);
        id
    }

    fn generic(
        &mut self,
        resolved: &ResolvedMethod,
        origin: MemberRef,
        inline: bool,
    ) -> Result<FunctionId> {
        if let Some(id) = self.generics.get(&origin) {
            return Ok(*id);
        }
        let id = self.reserve();
        self.generics.insert(origin.clone(), id);
        self.instantiate(resolved, origin, id, None, inline)?;
        Ok(id)
    }

    fn instantiate(
        &mut self,
        resolved: &ResolvedMethod,
        origin: MemberRef,
        id: FunctionId,
        spec: Option<SpecKey>,
        inline: bool,
    ) -> Result<()> {
        if self.depth >= self.config.max_trace_depth {
            return Err(Error::RecursionLimit(self.config.max_trace_depth));
        }
        self.depth += 1;
        let result = self.build_function(resolved, &origin, id, spec, inline);
        self.depth -= 1;

        let function = result.map_err(|err| err.in_method(origin.to_string()))?;
        trace!("Published {}", function.name);
        self.functions[id.0 as usize] = Some(function);
        Ok(())
    }

    fn template(&mut self, resolved: &ResolvedMethod, origin: &MemberRef) -> Result<TracedMethod> {
        if let Some(template) = self.templates.get(origin) {
            return Ok(template.clone());
        }

        let traced = MethodTracer::new(
            &self.classes,
            &origin.class,
            resolved.method(),
            &mut self.sites,
            &mut self.lambdas,
        )?
        .trace()?;
        for class in self.lambdas.drain() {
            debug!("Synthesized lambda class {}", class.name);
            self.classes.insert(class);
        }

        self.templates.insert(origin.clone(), traced.clone());
        Ok(traced)
    }

    fn build_function(
        &mut self,
        resolved: &ResolvedMethod,
        origin: &MemberRef,
        id: FunctionId,
        spec: Option<SpecKey>,
        inline: bool,
    ) -> Result<Function> {
        let method = resolved.method();
        self.register_class(&origin.class)?;
        let traced = self.template(resolved, origin)?;

        let mut flags = if spec.is_some() {
            FunctionFlags::SPECIALIZED
        } else {
            FunctionFlags::GENERIC
        };
        if method.is_static() {
            flags |= FunctionFlags::STATIC;
        }
        if method.inline_objects() {
            flags |= FunctionFlags::INLINE_OBJECTS;
        }
        if self.classes.is_synthetic(&origin.class) {
            flags |= FunctionFlags::SYNTHETIC;
        }

        let facts = spec.as_ref().map(|key| key.facts.clone());
        let mut function = Function {
            id,
            name: function_name(origin, id),
            origin: origin.clone(),
            ret: method.signature.ret.clone(),
            params: traced.params,
            vars: traced.vars,
            body: FunctionBody::Traced(traced.body),
            spec,
            inline: method.inline_hint(),
            inline_depth: 0,
            flags,
        };
        if let Some(facts) = facts {
            bind_facts(&mut function, &facts);
        }
        match &function.spec {
            Some(key) => debug!("Reifying {} as {}", key, function.name),
            None => debug!("Reifying {} as {}", origin, function.name),
        }

        self.process(&mut function, inline)?;
        Ok(function)
    }

    fn process(&mut self, function: &mut Function, inline: bool) -> Result<()> {
        let Some(body) = function.body_mut() else {
            return Ok(());
        };
        let mut body = std::mem::take(body);

        if self.config.dead_code {
            eliminate_dead_code(&mut body, &function.vars);
        }

        let explored = self.explore_body(function, &mut body, inline);
        if explored.is_ok() {
            body.recount_incoming();
            let mut passes: Vec<&dyn BodyPass> = Vec::new();
            if self.config.dead_code {
                passes.push(&DeadCodePass);
            }
            if self.config.loop_recovery {
                passes.push(&LoopRecoveryPass);
            }
            for pass in passes {
                if pass.run(&mut body, &function.vars) {
                    trace!("{} changed {}", pass.name(), function.name);
                }
            }
        }

        function.body = FunctionBody::Traced(body);
        explored
    }

    fn explore_body(
        &mut self,
        function: &mut Function,
        body: &mut Body,
        inline: bool,
    ) -> Result<()> {
        for block in 0..body.blocks.len() {
            for index in 0..body.blocks[block].stmts.len() {
                let mut stmt = std::mem::replace(&mut body.blocks[block].stmts[index], Stmt::Nop);
                let result = self.explore_stmt(function, &mut stmt, inline);
                body.blocks[block].stmts[index] = stmt;
                result?;
            }
        }
        Ok(())
    }

    fn explore_stmt(&mut self, function: &mut Function, stmt: &mut Stmt, inline: bool) -> Result<()> {
        if let Stmt::Assign {
            target: LValue::Field(field),
            ..
        } = &*stmt
        {
            if field.target.is_none() {
                let owner = field.owner.clone();
                self.register_known(&owner)?;
            }
        }

        let mut result = Ok(());
        stmt.for_each_expr_mut(&mut |expr| {
            if result.is_ok() {
                result = self.explore_expr(function, expr, inline);
            }
        });
        result?;

        self.inline_statement(function, stmt, inline);
        Ok(())
    }

    fn explore_expr(&mut self, function: &mut Function, expr: &mut Expr, inline: bool) -> Result<()> {
        if let Expr::Call(call) = expr {
            if call.callee == Callee::Unresolved {
                self.explore_call(function, call, inline)?;
                if let Some(replacement) = self.inline_expression(function, call, inline) {
                    *expr = replacement;
                }
                return Ok(());
            }
        }

        match expr {
            Expr::New {
                class,
                ctor: Some(ctor),
                ..
            } => {
                for arg in &mut ctor.args {
                    self.explore_expr(function, arg, inline)?;
                }
                self.instantiate_class(class)?;
                if ctor.callee == Callee::Unresolved {
                    let resolved = self.classes.resolve_method(
                        &ctor.method.class,
                        &ctor.method.name,
                        &ctor.method.descriptor,
                    )?;
                    let facts = std::iter::once(Fact::Unknown)
                        .chain(ctor.args.iter().map(|arg| Fact::of(arg, &function.vars)))
                        .collect();
                    ctor.callee = self.callee_of(&resolved, facts, inline)?;
                }
            }
            Expr::Literal(Literal::Object { heap, class }) => {
                if self.heap.insert(*heap) {
                    trace!("Captured heap object {} of {}", heap.0, class);
                }
                self.instantiate_class(class)?;
            }
            Expr::Field(field) if field.target.is_none() => {
                let owner = field.owner.clone();
                self.register_known(&owner)?;
            }
            _ => {
                for child in expr.children_mut() {
                    self.explore_expr(function, child, inline)?;
                }
            }
        }
        Ok(())
    }

    fn explore_call(&mut self, function: &mut Function, call: &mut Call, inline: bool) -> Result<()> {
        let target = self.direct_target(call)?;

        if let Some(resolved) = &target {
            if matches!(resolved.method().terminal(), Some(Annotation::Intrinsic { .. })) {
                let name = self.intrinsic_metaclass(resolved)?;
                if let Some(metaclass) = self.metaclasses.get(&name) {
                    metaclass
                        .rewrite_arguments(&call.method, &mut call.args)
                        .map_err(|message| Error::MetaclassInstantiation {
                            metaclass: name.clone(),
                            message,
                        })?;
                }
            }
        }

        if let Some(receiver) = &mut call.receiver {
            self.explore_expr(function, receiver, inline)?;
        }
        for arg in &mut call.args {
            self.explore_expr(function, arg, inline)?;
        }

        call.callee = match target {
            Some(resolved) => {
                let facts = call_arguments(call)
                    .into_iter()
                    .map(|arg| Fact::of(arg, &function.vars))
                    .collect();
                self.callee_of(&resolved, facts, inline)?
            }
            None => Callee::Dispatcher(self.dispatcher(&call.method, inline)?),
        };
        Ok(())
    }

    /// The statically bound target of a call, `None` for calls needing dynamic dispatch.
    fn direct_target(&mut self, call: &Call) -> Result<Option<ResolvedMethod>> {
        let method = &call.method;
        self.register_class(&method.class)?;
        let resolved = self
            .classes
            .resolve_method(&method.class, &method.name, &method.descriptor)?;

        let bound = match call.kind {
            InvokeKind::Static | InvokeKind::Special => true,
            InvokeKind::Virtual | InvokeKind::Interface => {
                let declared_final = self
                    .classes
                    .class(&method.class)
                    .is_some_and(|c| c.flags.contains(AccessFlags::FINAL));
                let target = resolved.method();
                !target.is_abstract()
                    && (target.is_final()
                        || declared_final
                        || resolved.class.flags.contains(AccessFlags::FINAL))
            }
        };
        Ok(bound.then_some(resolved))
    }

    fn callee_of(
        &mut self,
        resolved: &ResolvedMethod,
        facts: Vec<Fact>,
        inline: bool,
    ) -> Result<Callee> {
        Ok(match self.function_for(resolved, facts, inline)? {
            Some(id) => Callee::Function(id),
            None => Callee::Opaque,
        })
    }

    fn dispatcher(&mut self, method: &MemberRef, inline: bool) -> Result<DispatcherId> {
        if let Some(id) = self.dispatcher_index.get(method) {
            return Ok(*id);
        }
        self.register_class(&method.class)?;

        let id = DispatcherId(self.dispatchers.len() as u32);
        self.dispatchers.push(Dispatcher {
            id,
            method: method.clone(),
            entries: Vec::new(),
        });
        self.dispatcher_index.insert(method.clone(), id);
        self.dispatcher_inline.push(inline);
        if let Some(record) = self.types.get_mut(&method.class) {
            record.dispatchers.push(id);
        }
        debug!("Created dispatcher d{} for {}", id.0, method);

        self.populate(id)?;
        Ok(id)
    }

    /// Adds an entry for every instantiated concrete subtype not yet present.
    fn populate(&mut self, id: DispatcherId) -> Result<()> {
        let method = self.dispatchers[id.0 as usize].method.clone();
        let inline = self.dispatcher_inline[id.0 as usize];
        let candidates: Vec<String> = self
            .type_order
            .iter()
            .filter(|name| {
                self.types
                    .get(*name)
                    .is_some_and(|t| t.instantiated && !t.is_abstract)
                    && !self.dispatchers[id.0 as usize].contains(name)
                    && self.classes.is_subtype(name, &method.class)
            })
            .cloned()
            .collect();

        for class in candidates {
            let resolved = self
                .classes
                .resolve_method(&class, &method.name, &method.descriptor)?;
            let Some(function) = self.function_for(&resolved, Vec::new(), inline)? else {
                continue;
            };
            let dispatcher = &mut self.dispatchers[id.0 as usize];
            if !dispatcher.contains(&class) {
                debug!("Dispatcher d{}: {} -> f{}", id.0, class, function.0);
                dispatcher.entries.push((class, function));
            }
        }
        Ok(())
    }

    fn instantiate_class(&mut self, name: &str) -> Result<()> {
        self.register_class(name)?;
        if let Some(record) = self.types.get_mut(name) {
            if !record.instantiated {
                record.instantiated = true;
                debug!("Class {} is instantiated", name);
            }
        }
        Ok(())
    }

    /// Registers `name` if the oracle knows it.
    fn register_known(&mut self, name: &str) -> Result<()> {
        if self.classes.class(name).is_some() {
            self.register_class(name)?;
        }
        Ok(())
    }

    fn resolve_metaclass(&self, info: &ClassInfo) -> Result<Option<String>> {
        if let Some(hint) = info.metaclass_hint() {
            return Ok(Some(hint.to_string()));
        }

        let mut candidates: Vec<String> = Vec::new();
        for ancestor in self.classes.ancestors(&info.name) {
            let Some(class) = self.classes.class(&ancestor) else {
                continue;
            };
            if let Some(hint) = class.metaclass_hint() {
                if !candidates.iter().any(|c| c == hint) {
                    candidates.push(hint.to_string());
                }
            }
        }

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.pop()),
            _ => Err(Error::AmbiguousMetaclass {
                class: info.name.clone(),
                candidates,
            }),
        }
    }

    /// Name of the registered metaclass expanding an intrinsic method.
    fn intrinsic_metaclass(&mut self, resolved: &ResolvedMethod) -> Result<String> {
        let method = resolved.method();
        let qualified = format!("{}.{}{}", resolved.class.name, method.name, method.descriptor);
        let explicit = match method.terminal() {
            Some(Annotation::Intrinsic { metaclass }) => metaclass.clone(),
            _ => None,
        };

        let name = match explicit {
            Some(name) => name,
            None => {
                self.register_class(&resolved.class.name)?;
                self.types
                    .get(&resolved.class.name)
                    .and_then(|t| t.metaclass.clone())
                    .ok_or_else(|| Error::MissingMetaclass {
                        metaclass: "<none>".to_string(),
                        method: qualified.clone(),
                    })?
            }
        };

        if !self.metaclasses.contains_key(&name) {
            return Err(Error::MissingMetaclass {
                metaclass: name,
                method: qualified,
            });
        }
        Ok(name)
    }

    fn terminal(
        &mut self,
        resolved: &ResolvedMethod,
        origin: MemberRef,
        annotation: Annotation,
    ) -> Result<FunctionId> {
        if let Some(id) = self.terminals.get(&origin) {
            return Ok(*id);
        }
        let method = resolved.method();

        let body = match annotation {
            Annotation::Native { source } => FunctionBody::Native { source },
            Annotation::Foreign { symbol } => {
                if !method.is_static() {
                    return Err(Error::AnnotationMisuse {
                        method: origin.to_string(),
                        message: "foreign methods must be static".to_string(),
                    });
                }
                FunctionBody::Foreign { symbol }
            }
            Annotation::Intrinsic { .. } => {
                if !method.is_public() {
                    return Err(Error::AnnotationMisuse {
                        method: origin.to_string(),
                        message: "intrinsic methods must be public".to_string(),
                    });
                }
                FunctionBody::Intrinsic {
                    metaclass: self.intrinsic_metaclass(resolved)?,
                }
            }
            other => {
                return Err(malformed_error!(
                    "annotation {:?} does not replace a method body",
                    other
                ))
            }
        };

        self.register_class(&origin.class)?;
        let mut vars = VarTable::new();
        let params = parameter_vars(&origin.class, method, &mut vars)
            .into_iter()
            .map(|(var, _)| var)
            .collect();
        let mut flags = FunctionFlags::GENERIC;
        if method.is_static() {
            flags |= FunctionFlags::STATIC;
        }

        let id = self.reserve();
        self.terminals.insert(origin.clone(), id);
        debug!("Terminal function f{} for {}", id.0, origin);
        self.functions[id.0 as usize] = Some(Function {
            id,
            name: function_name(&origin, id),
            origin,
            ret: method.signature.ret.clone(),
            params,
            vars,
            body,
            spec: None,
            inline: None,
            inline_depth: 0,
            flags,
        });
        Ok(id)
    }

    /// The callee of `call` if it may be spliced into `caller`, whose body is explored under
    /// the inline context `inline`.
    fn inline_candidate(&self, caller: &Function, call: &Call, inline: bool) -> Option<&Function> {
        let Callee::Function(id) = call.callee else {
            return None;
        };
        let callee = self.functions.get(id.0 as usize)?.as_ref()?;
        (callee.inline.unwrap_or(inline)
            && callee.id != caller.id
            && callee.body().is_some()
            && callee.inline_depth < self.config.max_inline_depth
            && callee.statement_count() <= self.config.inline_max_statements)
            .then_some(callee)
    }

    fn inline_expression(&self, function: &mut Function, call: &Call, inline: bool) -> Option<Expr> {
        let callee = self.inline_candidate(function, call, inline)?;
        let expr = inliner::inline_expression(callee, call, &function.vars, &self.classes)?;
        function.inline_depth = function.inline_depth.max(callee.inline_depth + 1);
        trace!("Inlined {} as expression into {}", callee.name, function.name);
        Some(expr)
    }

    fn inline_statement(&self, function: &mut Function, stmt: &mut Stmt, inline: bool) {
        let (call, result) = match &*stmt {
            Stmt::Eval(Expr::Call(call)) => (call, None),
            Stmt::Assign {
                target: LValue::Var(var),
                value: Expr::Call(call),
            } => (call, Some(*var)),
            _ => return,
        };
        let Some(callee) = self.inline_candidate(function, call, inline) else {
            return;
        };
        let Some(mut spliced) =
            inliner::inline_statement(callee, call, result, &mut function.vars, &self.classes)
        else {
            return;
        };

        if self.config.object_inlining && callee.flags.contains(FunctionFlags::INLINE_OBJECTS) {
            inline_objects(&mut spliced, &mut function.vars, &self.classes);
        }
        function.inline_depth = function.inline_depth.max(callee.inline_depth + 1);
        trace!("Inlined {} as statement into {}", callee.name, function.name);
        *stmt = Stmt::Inlined(Box::new(spliced));
    }
}

fn function_name(origin: &MemberRef, id: FunctionId) -> String {
    format!("{}.{}#{}", origin.class.replace('/', "."), origin.name, id.0)
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{Callee, Expr, FunctionBody, FunctionFlags, Literal, Stmt},
        bytecode::opcodes::*,
        config::ReifierConfig,
        model::{AccessFlags, Annotation, ClassBuilder, MemberRef, MethodBuilder},
        reify::{Reifier, UNBOXING_METACLASS},
        test::{class_path, plain_class, static_method},
        Error,
    };

    fn calls_in(function: &crate::ast::Function) -> Vec<Callee> {
        let mut callees = Vec::new();
        if let Some(body) = function.body() {
            for stmt in body.stmts() {
                stmt.for_each_expr(&mut |expr| {
                    expr.walk(&mut |e| {
                        if let Expr::Call(call) = e {
                            callees.push(call.callee);
                        }
                    });
                });
            }
        }
        callees
    }

    #[test]
    fn specializations_are_capped_per_shape() {
        let classes = class_path([plain_class("demo/Main")
            .method(static_method("sink", "(I)V", 1, |asm| {
                asm.op(RETURN)?;
                Ok(())
            }))
            .method(static_method("main", "()V", 0, |asm| {
                for value in 0..5 {
                    asm.iconst(value)?
                        .invokestatic("demo/Main", "sink", "(I)V")?;
                }
                asm.op(RETURN)?;
                Ok(())
            }))]);

        let config = ReifierConfig::no_inlining().with_max_specializations(3);
        let mut reifier = Reifier::with_config(&classes, config);
        reifier.reify_method("demo/Main", "main", "()V").unwrap();
        let snapshot = reifier.snapshot().unwrap();

        let sink = MemberRef::new("demo/Main", "sink", "(I)V");
        let functions: Vec<_> = snapshot.functions_of(&sink).collect();
        assert_eq!(functions.len(), 4);
        let specialized = functions
            .iter()
            .filter(|f| f.flags.contains(FunctionFlags::SPECIALIZED))
            .count();
        assert_eq!(specialized, 3);

        let generic = functions
            .iter()
            .find(|f| f.flags.contains(FunctionFlags::GENERIC))
            .unwrap()
            .id;
        let main = snapshot.entry_function().unwrap();
        let callees = calls_in(main);
        assert_eq!(callees.len(), 5);
        assert_eq!(callees[3], Callee::Function(generic));
        assert_eq!(callees[4], Callee::Function(generic));
    }

    #[test]
    fn recursion_resolves_to_the_reserved_function() {
        // static int down(int n) { if (n == 0) return 0; return down(n - 1); }
        let classes = class_path([plain_class("demo/Main").method(static_method(
            "down",
            "(I)I",
            1,
            |asm| {
                asm.iload(0)?
                    .branch(IFNE, "recurse")?
                    .iconst(0)?
                    .op(IRETURN)?
                    .label("recurse")?
                    .iload(0)?
                    .iconst(1)?
                    .op(ISUB)?
                    .invokestatic("demo/Main", "down", "(I)I")?
                    .op(IRETURN)?;
                Ok(())
            },
        ))]);

        let mut reifier = Reifier::new(&classes);
        let entry = MemberRef::new("demo/Main", "down", "(I)I");
        reifier
            .reify(&entry, vec![crate::reify::Fact::Const(Literal::Int(3))])
            .unwrap();
        let snapshot = reifier.snapshot().unwrap();

        let functions: Vec<_> = snapshot.functions_of(&entry).collect();
        assert_eq!(functions.len(), 2);
        let generic = functions
            .iter()
            .find(|f| f.flags.contains(FunctionFlags::GENERIC))
            .unwrap();
        assert!(calls_in(generic).contains(&Callee::Function(generic.id)));
    }

    /// `static int main() { return id(5); }` with `id` optionally annotated.
    fn identity_classes(hint: Option<bool>) -> crate::model::ClassPath {
        let mut id = static_method("id", "(I)I", 1, |asm| {
            asm.iload(0)?.op(IRETURN)?;
            Ok(())
        });
        if let Some(enabled) = hint {
            id = id.annotation(Annotation::Inline(enabled));
        }
        class_path([plain_class("demo/Main")
            .method(id)
            .method(static_method("main", "()I", 0, |asm| {
                asm.iconst(5)?
                    .invokestatic("demo/Main", "id", "(I)I")?
                    .op(IRETURN)?;
                Ok(())
            }))])
    }

    #[test]
    fn inline_false_callee_stays_a_call() {
        let classes = identity_classes(Some(false));
        let config = ReifierConfig::new().with_inlining(true, 64);
        let mut reifier = Reifier::with_config(&classes, config);
        reifier.reify_method("demo/Main", "main", "()I").unwrap();
        let snapshot = reifier.snapshot().unwrap();

        let main = snapshot.entry_function().unwrap();
        assert_eq!(main.inline_depth, 0);
        assert!(matches!(calls_in(main).as_slice(), [Callee::Function(_)]));
    }

    #[test]
    fn unannotated_callee_is_not_inlined_by_default() {
        let classes = identity_classes(None);
        let mut reifier = Reifier::new(&classes);
        reifier.reify_method("demo/Main", "main", "()I").unwrap();
        let snapshot = reifier.snapshot().unwrap();

        let main = snapshot.entry_function().unwrap();
        assert!(matches!(calls_in(main).as_slice(), [Callee::Function(_)]));
    }

    #[test]
    fn inline_true_callee_is_inlined_by_default() {
        let classes = identity_classes(Some(true));
        let mut reifier = Reifier::new(&classes);
        reifier.reify_method("demo/Main", "main", "()I").unwrap();
        let snapshot = reifier.snapshot().unwrap();

        let main = snapshot.entry_function().unwrap();
        assert_eq!(main.inline_depth, 1);
        assert!(calls_in(main).is_empty());
    }

    #[test]
    fn inline_context_is_inherited_by_unannotated_callees() {
        // wrap is annotated, id is not: id is inlined into wrap, wrap into main
        let classes = class_path([plain_class("demo/Main")
            .method(static_method("id", "(I)I", 1, |asm| {
                asm.iload(0)?.op(IRETURN)?;
                Ok(())
            }))
            .method(
                static_method("wrap", "(I)I", 1, |asm| {
                    asm.iload(0)?
                        .invokestatic("demo/Main", "id", "(I)I")?
                        .op(IRETURN)?;
                    Ok(())
                })
                .annotation(Annotation::Inline(true)),
            )
            .method(static_method("main", "()I", 0, |asm| {
                asm.iconst(5)?
                    .invokestatic("demo/Main", "wrap", "(I)I")?
                    .op(IRETURN)?;
                Ok(())
            }))]);

        let mut reifier = Reifier::new(&classes);
        reifier.reify_method("demo/Main", "main", "()I").unwrap();
        let snapshot = reifier.snapshot().unwrap();

        let main = snapshot.entry_function().unwrap();
        assert_eq!(main.inline_depth, 2);
        assert!(calls_in(main).is_empty());
    }

    #[test]
    fn intrinsic_arguments_are_unboxed() {
        let classes = class_path([plain_class("demo/Main")
            .annotation(Annotation::Metaclass(UNBOXING_METACLASS.to_string()))
            .method(
                MethodBuilder::new("emit", "(Ljava/lang/Integer;)V")
                    .flags(AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::NATIVE)
                    .annotation(Annotation::Intrinsic { metaclass: None }),
            )
            .method(static_method("main", "()V", 0, |asm| {
                asm.iconst(7)?
                    .invokestatic("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;")?
                    .invokestatic("demo/Main", "emit", "(Ljava/lang/Integer;)V")?
                    .op(RETURN)?;
                Ok(())
            }))]);

        let mut reifier = Reifier::new(&classes);
        reifier.reify_method("demo/Main", "main", "()V").unwrap();
        let snapshot = reifier.snapshot().unwrap();

        let main = snapshot.entry_function().unwrap();
        let call = main
            .body()
            .unwrap()
            .stmts()
            .find_map(|stmt| match stmt {
                Stmt::Eval(Expr::Call(call)) => Some(call.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(call.args, vec![Expr::int(7)]);

        let Callee::Function(id) = call.callee else {
            panic!("intrinsic call was not resolved: {:?}", call.callee);
        };
        assert_eq!(
            snapshot.function(id).unwrap().body,
            FunctionBody::Intrinsic {
                metaclass: UNBOXING_METACLASS.to_string()
            }
        );
    }

    #[test]
    fn unregistered_metaclass_is_rejected() {
        let classes = class_path([plain_class("demo/Main")
            .method(
                MethodBuilder::new("emit", "()V")
                    .flags(AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::NATIVE)
                    .annotation(Annotation::Intrinsic {
                        metaclass: Some("demo/Missing".to_string()),
                    }),
            )
            .method(static_method("main", "()V", 0, |asm| {
                asm.invokestatic("demo/Main", "emit", "()V")?.op(RETURN)?;
                Ok(())
            }))]);

        let mut reifier = Reifier::new(&classes);
        let err = reifier.reify_method("demo/Main", "main", "()V").unwrap_err();
        assert!(matches!(err, Error::Trace { .. }));
        match err.root_cause() {
            Error::MissingMetaclass { metaclass, .. } => assert_eq!(metaclass, "demo/Missing"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn non_public_intrinsic_is_misuse() {
        let classes = class_path([plain_class("demo/Main")
            .method(
                MethodBuilder::new("emit", "()V")
                    .flags(AccessFlags::STATIC | AccessFlags::NATIVE)
                    .annotation(Annotation::Intrinsic {
                        metaclass: Some(UNBOXING_METACLASS.to_string()),
                    }),
            )
            .method(static_method("main", "()V", 0, |asm| {
                asm.invokestatic("demo/Main", "emit", "()V")?.op(RETURN)?;
                Ok(())
            }))]);

        let mut reifier = Reifier::new(&classes);
        let err = reifier.reify_method("demo/Main", "main", "()V").unwrap_err();
        assert!(matches!(err.root_cause(), Error::AnnotationMisuse { .. }));
    }

    #[test]
    fn conflicting_metaclass_hints_are_ambiguous() {
        let interface = |name: &str, metaclass: &str| {
            ClassBuilder::new(name)
                .flags(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
                .annotation(Annotation::Metaclass(metaclass.to_string()))
        };
        let classes = class_path([
            interface("demo/Left", "demo/MetaA"),
            interface("demo/Right", "demo/MetaB"),
            plain_class("demo/Both")
                .implements("demo/Left")
                .implements("demo/Right"),
            plain_class("demo/Main").method(static_method("main", "()V", 0, |asm| {
                asm.new_object("demo/Both")?
                    .op(DUP)?
                    .invokespecial("demo/Both", "<init>", "()V")?
                    .op(POP)?
                    .op(RETURN)?;
                Ok(())
            })),
        ]);

        let mut reifier = Reifier::new(&classes);
        let err = reifier.reify_method("demo/Main", "main", "()V").unwrap_err();
        match err.root_cause() {
            Error::AmbiguousMetaclass { class, candidates } => {
                assert_eq!(class, "demo/Both");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn depth_guard_reports_recursion_limit() {
        // a() calls b(), b() calls c(); a depth of two can't reach c
        let classes = class_path([plain_class("demo/Main")
            .method(static_method("a", "()V", 0, |asm| {
                asm.invokestatic("demo/Main", "b", "()V")?.op(RETURN)?;
                Ok(())
            }))
            .method(static_method("b", "()V", 0, |asm| {
                asm.invokestatic("demo/Main", "c", "()V")?.op(RETURN)?;
                Ok(())
            }))
            .method(static_method("c", "()V", 0, |asm| {
                asm.op(RETURN)?;
                Ok(())
            }))]);

        let config = ReifierConfig::minimal().with_max_trace_depth(2);
        let mut reifier = Reifier::with_config(&classes, config);
        let err = reifier.reify_method("demo/Main", "a", "()V").unwrap_err();
        assert!(matches!(err.root_cause(), Error::RecursionLimit(2)));
    }
}
