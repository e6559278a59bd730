//! The public entry point of a reification session.

use log::{debug, info};

use crate::{
    ast::{Dispatcher, DispatcherId, Function, FunctionId, TypeDef},
    config::ReifierConfig,
    model::{ClassOracle, HeapRef, MemberRef},
    reify::{
        metaclass::{Metaclass, UnboxingMetaclass, UNBOXING_METACLASS},
        specialize::Fact,
        tracer::Tracer,
    },
    Result,
};

/// A reification session.
///
/// The session explores the call graph reachable from one or more entry methods, reifying every
/// reached method into a [`Function`] specialized on the facts known at its call sites. All
/// tables grow monotonically; [`Reifier::snapshot`] copies them out once exploration is done.
///
/// Sessions are single-threaded and exclusively own their tables. The class oracle is shared
/// read-only.
///
/// # Examples
///
/// ```rust,no_run
/// use jreify::prelude::*;
///
/// let classes = ClassPath::new();
/// let mut reifier = Reifier::new(&classes);
/// let entry = reifier.reify_method("demo/Main", "main", "()V")?;
/// let snapshot = reifier.snapshot()?;
/// println!("{}", snapshot.function(entry).unwrap());
/// # Ok::<(), jreify::Error>(())
/// ```
pub struct Reifier<'a> {
    tracer: Tracer<'a>,
    entry: Option<FunctionId>,
}

impl<'a> Reifier<'a> {
    /// Creates a session with the default configuration.
    #[must_use]
    pub fn new(classes: &'a dyn ClassOracle) -> Self {
        Self::with_config(classes, ReifierConfig::default())
    }

    /// Creates a session with a custom configuration.
    ///
    /// The [`UnboxingMetaclass`] is registered as `jreify/Unboxing`.
    #[must_use]
    pub fn with_config(classes: &'a dyn ClassOracle, config: ReifierConfig) -> Self {
        let mut tracer = Tracer::new(classes, config);
        tracer
            .metaclasses
            .insert(UNBOXING_METACLASS.to_string(), Box::new(UnboxingMetaclass));
        Reifier {
            tracer,
            entry: None,
        }
    }

    /// The configuration of this session.
    #[must_use]
    pub fn config(&self) -> &ReifierConfig {
        &self.tracer.config
    }

    /// Registers a metaclass under `name`, replacing an earlier registration.
    pub fn register_metaclass(&mut self, name: &str, metaclass: Box<dyn Metaclass>) {
        self.tracer.metaclasses.insert(name.to_string(), metaclass);
    }

    /// Reifies `method` for a call with the given argument facts, receiver first.
    ///
    /// Missing facts are treated as unknown. The call graph reachable from the method is explored
    /// and all dispatchers are saturated before this returns. The last reified method becomes
    /// the entry of the snapshot.
    ///
    /// # Arguments
    /// * `method` - Method reference, resolved through the class hierarchy
    /// * `facts` - What is known about the arguments
    ///
    /// # Errors
    /// Returns [`crate::Error::MethodNotFound`] if the method doesn't resolve,
    /// [`crate::Error::Malformed`] if it has neither code nor a terminal annotation, and any
    /// error raised while exploring the reachable call graph.
    pub fn reify(&mut self, method: &MemberRef, facts: Vec<Fact>) -> Result<FunctionId> {
        info!("Reifying entry {}", method);
        let resolved =
            self.tracer
                .classes
                .resolve_method(&method.class, &method.name, &method.descriptor)?;
        let inherited = self.tracer.config.inline_by_default;
        let Some(id) = self.tracer.function_for(&resolved, facts, inherited)? else {
            return Err(malformed_error!("entry method {} has no code", method));
        };
        self.tracer.saturate()?;

        debug!(
            "Session holds {} functions, {} types and {} dispatchers",
            self.tracer.functions.len(),
            self.tracer.types.len(),
            self.tracer.dispatchers.len()
        );
        self.entry = Some(id);
        Ok(id)
    }

    /// Reifies a method without argument facts.
    ///
    /// # Errors
    /// See [`Reifier::reify`].
    pub fn reify_method(&mut self, class: &str, name: &str, descriptor: &str) -> Result<FunctionId> {
        self.reify(&MemberRef::new(class, name, descriptor), Vec::new())
    }

    /// A published function of this session.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.tracer.functions.get(id.0 as usize)?.as_ref()
    }

    /// Copies the session tables out.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a reserved function was never published, which
    /// only happens after an exploration error was ignored.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let functions = self
            .tracer
            .functions
            .iter()
            .enumerate()
            .map(|(index, function)| {
                function
                    .clone()
                    .ok_or_else(|| malformed_error!("function f{} was never published", index))
            })
            .collect::<Result<Vec<_>>>()?;
        let types = self
            .tracer
            .type_order
            .iter()
            .filter_map(|name| self.tracer.types.get(name).cloned())
            .collect();

        Ok(Snapshot {
            entry: self.entry,
            functions,
            types,
            dispatchers: self.tracer.dispatchers.clone(),
            heap: self.tracer.heap.iter().copied().collect(),
        })
    }
}

/// The immutable result of a session.
///
/// Functions and dispatchers are indexed by their ids; types are in registration order.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The function of the last reified entry method
    pub entry: Option<FunctionId>,
    /// All functions, indexed by [`FunctionId`]
    pub functions: Vec<Function>,
    /// All registered types
    pub types: Vec<TypeDef>,
    /// All dispatchers, indexed by [`DispatcherId`]
    pub dispatchers: Vec<Dispatcher>,
    /// Every captured heap object, ascending
    pub heap: Vec<HeapRef>,
}

impl Snapshot {
    /// Returns the function with the given id.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    /// Returns the entry function.
    #[must_use]
    pub fn entry_function(&self) -> Option<&Function> {
        self.function(self.entry?)
    }

    /// All functions reified from `method`, generic and specialized.
    pub fn functions_of<'s>(&'s self, method: &'s MemberRef) -> impl Iterator<Item = &'s Function> {
        self.functions.iter().filter(move |f| &f.origin == method)
    }

    /// Returns the registered type `class`.
    #[must_use]
    pub fn type_def(&self, class: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.class == class)
    }

    /// Returns the dispatcher with the given id.
    #[must_use]
    pub fn dispatcher(&self, id: DispatcherId) -> Option<&Dispatcher> {
        self.dispatchers.get(id.0 as usize)
    }

    /// All dispatchers declared on `class`.
    pub fn dispatchers_of<'s>(&'s self, class: &'s str) -> impl Iterator<Item = &'s Dispatcher> {
        self.dispatchers.iter().filter(move |d| d.method.class == class)
    }

    /// Captured heap objects.
    #[must_use]
    pub fn heap_objects(&self) -> &[HeapRef] {
        &self.heap
    }
}
