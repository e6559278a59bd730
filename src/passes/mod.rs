//! Structural normalization passes over reified bodies.
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`DeadCodePass`] | Folds constant branches, drops unreachable code and jumps to the next block |
//! | [`LoopRecoveryPass`] | Recovers counted `for` loops from the two common compiler layouts |
//! | [`inline_objects`] | Replaces fields of non-escaping objects in an inlined splice by temporaries |
//!
//! Body passes run in place and report whether they changed anything. Object inlining works on
//! a single inlined splice and is driven by the inliner.

mod deadcode;
mod forloop;
mod objinline;

pub use deadcode::{eliminate_dead_code, DeadCodePass};
pub use forloop::{recover_loops, LoopRecoveryPass};
pub use objinline::inline_objects;

use crate::ast::{Body, VarTable};

/// A transformation of one function body.
pub trait BodyPass {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Runs the pass, returning `true` if the body changed.
    fn run(&self, body: &mut Body, vars: &VarTable) -> bool;
}
