//! # jreify Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the jreify library. Import this module to get quick access to the essential
//! types for building class models and reifying them.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all jreify operations
pub use crate::Error;

/// The result type used throughout jreify
pub use crate::Result;

/// Configuration of a reification session
pub use crate::config::ReifierConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Reification session and its result
pub use crate::reify::{Fact, Reifier, Snapshot, SpecKey};

/// Metaclasses for intrinsic methods
pub use crate::reify::{Metaclass, UnboxingMetaclass, UNBOXING_METACLASS};

// ================================================================================================
// Class Model
// ================================================================================================

/// Class descriptors and the oracle they are read through
pub use crate::model::{
    AccessFlags, Annotation, ClassBuilder, ClassInfo, ClassOracle, ClassPath, FieldInfo,
    HeapObject, HeapRef, JType, MemberRef, MethodBuilder, MethodCode, MethodInfo,
};

/// Bytecode assembly for synthesized methods
pub use crate::bytecode::BytecodeAssembler;

// ================================================================================================
// Abstract Syntax Tree
// ================================================================================================

/// Tree nodes
pub use crate::ast::{
    Block, Body, Call, Callee, CondOp, Condition, Expr, LValue, Literal, Stmt, VarId, VarTable,
};

/// Session-level tables
pub use crate::ast::{Dispatcher, DispatcherId, Function, FunctionBody, FunctionId, TypeDef};
