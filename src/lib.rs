// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # jreify
//!
//! Reifies JVM stack bytecode into a typed abstract syntax tree suitable for ahead-of-time
//! compilation to another language.
//!
//! Starting from an entry method, `jreify` explores the statically reachable call graph and
//! turns every reached method body into structured, typed statements and expressions. Methods are
//! specialized on the constants known at their call sites, virtual calls are resolved against the
//! classes actually instantiated, small callees are inlined, and the resulting bodies are
//! normalized by dead code elimination and loop recovery.
//!
//! ## Features
//!
//! - **Abstract interpretation** - The operand stack is simulated per basic block; values that
//!   cross block boundaries are spilled into temporaries and merged where paths meet
//! - **Variable identity** - Stores that reach the same local slot at a merge are unified into
//!   one source-level variable
//! - **Call-site specialization** - One function per distinct set of argument facts, capped per
//!   method and call shape
//! - **Class hierarchy analysis** - Dispatchers cover exactly the instantiated concrete
//!   overrides, saturated to a fixpoint
//! - **Inlining** - Hygienic expression-like and statement-like inlining, with optional object
//!   inlining of non-escaping allocations
//! - **Annotations** - Native, foreign and intrinsic methods become terminal functions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jreify::prelude::*;
//!
//! let mut classes = ClassPath::new();
//! # let class = ClassBuilder::new("demo/Main").build()?;
//! classes.add(class);
//!
//! let mut reifier = Reifier::new(&classes);
//! reifier.reify_method("demo/Main", "main", "()V")?;
//!
//! let snapshot = reifier.snapshot()?;
//! for function in &snapshot.functions {
//!     println!("{function}");
//! }
//! # Ok::<(), jreify::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Bounds-checked big-endian reading of code arrays
//! - [`bytecode`] - Instruction decoding, block partitioning and assembly
//! - [`model`] - The host class model and the [`model::ClassOracle`] it is read through
//! - [`ast`] - The typed tree: expressions, statements, functions, types and dispatchers
//! - [`reify`] - The reification session
//! - [`passes`] - Normalization passes over reified bodies
//! - [`config`] - Session configuration

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use jreify::prelude::*;
///
/// let classes = ClassPath::new();
/// let mut reifier = Reifier::with_config(&classes, ReifierConfig::no_inlining());
/// let id = reifier.reify_method("demo/Main", "main", "()V")?;
/// # Ok::<(), jreify::Error>(())
/// ```
pub mod prelude;

pub mod ast;
pub mod bytecode;
pub mod config;
pub mod file;
pub mod model;
pub mod passes;
pub mod reify;

/// `jreify` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `jreify` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust,no_run
/// use jreify::prelude::*;
///
/// let classes = ClassPath::new();
/// let mut reifier = Reifier::new(&classes);
/// match reifier.reify_method("demo/Main", "main", "()V") {
///     Ok(id) => println!("entry is f{}", id.0),
///     Err(Error::ClassNotFound(name)) => println!("unknown class {}", name),
///     Err(e) => println!("Error: {}", e.root_cause()),
/// }
/// ```
pub use error::Error;
