//! Merging of abstract frame states where control paths join.

use crate::{
    ast::{Expr, Stmt},
    reify::{
        identity::IdentityResolver,
        interpreter::MethodContext,
        state::{FrameState, Slot},
    },
    Result,
};

/// Merges the exit state of a predecessor into the established entry state of a block.
///
/// Stack slots of the entry state are temporaries; the incoming value is assigned to the
/// temporary at the end of the predecessor, before its jump. Local slots holding different
/// variables are unified in `identity` and the entry variable becomes mutable.
///
/// # Errors
/// Returns [`crate::Error::BadInstructionStream`] if the stack heights differ or a stack slot
/// can't be reconciled.
pub(crate) fn merge_states(
    ctx: &mut MethodContext,
    identity: &mut IdentityResolver,
    entry: &mut FrameState,
    incoming: &FrameState,
    predecessor: &mut Vec<Stmt>,
    offset: usize,
) -> Result<()> {
    if entry.depth() != incoming.depth() {
        return Err(bad_stream!(
            offset,
            "stack height mismatch at join: {} vs {}",
            entry.depth(),
            incoming.depth()
        ));
    }

    for (established, arriving) in entry.stack.iter().zip(&incoming.stack) {
        match (established, arriving) {
            (Slot::Empty, Slot::Empty) => {}
            (Slot::Value(established), Slot::Value(arriving)) if established == arriving => {}
            (Slot::Value(Expr::Var(temp)), Slot::Value(arriving))
                if ctx.vars[*temp].is_temp() =>
            {
                insert_before_jump(predecessor, Stmt::assign(*temp, arriving.clone()));
                ctx.vars[*temp].mark_mutable();
            }
            _ => {
                return Err(bad_stream!(
                    offset,
                    "incompatible stack values at join"
                ))
            }
        }
    }

    for (established, arriving) in entry.locals.iter().zip(&incoming.locals) {
        if let (Some(established), Some(arriving)) = (established, arriving) {
            if established != arriving {
                identity.merge(&ctx.vars, ctx.classes, *established, *arriving);
                ctx.vars[*established].mark_mutable();
            }
        }
    }
    Ok(())
}

/// Inserts `stmt` before a trailing jump of `stmts`, or appends it.
pub(crate) fn insert_before_jump(stmts: &mut Vec<Stmt>, stmt: Stmt) {
    let position = match stmts.last() {
        Some(last) if last.is_jump() => stmts.len() - 1,
        _ => stmts.len(),
    };
    stmts.insert(position, stmt);
}
