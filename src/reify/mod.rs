//! Reification of method bytecode into typed function bodies.
//!
//! A session starts from an entry method and explores everything reachable from it. Each method
//! is traced once into a template by abstract interpretation of its operand stack, then
//! instantiated per distinct set of argument facts. Call sites are resolved to specialized
//! functions or to dispatchers, and small callees are inlined into their callers.
//!
//! # Architecture
//!
//! - [`Reifier`] - Public session API, producing a [`Snapshot`]
//! - `tracer` - Call graph exploration, specialization, dispatchers and inlining decisions
//! - `method` - Per-method worklist over the basic blocks of one method
//! - `interpreter` - Abstract interpretation of the instructions of one block
//! - `merge` - Reconciliation of frame states where control paths meet
//! - [`IdentityResolver`] - Unification of variables that stand for one source variable
//! - `inliner` - Expression-like and statement-like call inlining
//! - [`LambdaFactory`] - Synthesis of classes for `invokedynamic` lambda sites
//! - [`Metaclass`] - Expansion strategies of intrinsic methods
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use jreify::prelude::*;
//!
//! let classes = ClassPath::new();
//! let mut reifier = Reifier::new(&classes);
//! let entry = MemberRef::new("demo/Main", "square", "(I)I");
//! let id = reifier.reify(&entry, vec![Fact::Const(Literal::Int(5))])?;
//! if let Some(function) = reifier.function(id) {
//!     println!("{function}");
//! }
//! # Ok::<(), jreify::Error>(())
//! ```

mod identity;
mod ids;
mod inliner;
mod interpreter;
mod lambda;
mod merge;
mod metaclass;
mod method;
mod session;
mod specialize;
mod state;
mod tracer;

pub use identity::IdentityResolver;
pub use ids::IdAllocator;
pub use lambda::LambdaFactory;
pub use metaclass::{Metaclass, UnboxingMetaclass, UNBOXING_METACLASS};
pub use session::{Reifier, Snapshot};
pub use specialize::{Fact, SpecKey};
