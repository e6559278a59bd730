//! Metaclasses expand intrinsic methods.
//!
//! A method annotated as intrinsic has no traced body; its expansion is left to the code
//! generator through the metaclass named by the annotation or inherited from the declaring
//! class. During exploration the metaclass may rewrite the arguments of every call to such a
//! method before they are explored.

use crate::{
    ast::{Expr, InvokeKind},
    model::{is_wrapper_class, MemberRef},
};

/// Name under which [`UnboxingMetaclass`] is registered in every session.
pub const UNBOXING_METACLASS: &str = "jreify/Unboxing";

/// Expansion strategy for intrinsic methods.
pub trait Metaclass {
    /// Rewrites the arguments of a call to the intrinsic `method`.
    ///
    /// The default implementation leaves the arguments untouched.
    ///
    /// # Errors
    /// Returns a description of the problem if the call can't be handled; the session reports
    /// it as [`crate::Error::MetaclassInstantiation`].
    fn rewrite_arguments(
        &self,
        method: &MemberRef,
        args: &mut [Expr],
    ) -> std::result::Result<(), String> {
        let _ = (method, args);
        Ok(())
    }
}

/// Strips boxing conversions from intrinsic arguments.
///
/// Arguments of the form `Integer.valueOf(x)` (and the other wrappers) are replaced by `x`, so
/// that the intrinsic sees the primitive value and specialization can use its constant.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnboxingMetaclass;

impl Metaclass for UnboxingMetaclass {
    fn rewrite_arguments(
        &self,
        _method: &MemberRef,
        args: &mut [Expr],
    ) -> std::result::Result<(), String> {
        for arg in args.iter_mut() {
            let unboxed = match arg {
                Expr::Call(call)
                    if call.kind == InvokeKind::Static
                        && call.method.name == "valueOf"
                        && call.args.len() == 1
                        && is_wrapper_class(&call.method.class) =>
                {
                    call.args.pop()
                }
                _ => None,
            };
            if let Some(unboxed) = unboxed {
                *arg = unboxed;
            }
        }
        Ok(())
    }
}
