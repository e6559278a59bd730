//! Blocks and bodies.
//!
//! A [`Body`] is an ordered vector of [`Block`]s. Block 0 is the entry. Control falls through
//! from block `i` to block `i + 1` unless the last statement of `i` is a terminator. Jumps refer
//! to blocks by index; inside an inlined body the index `blocks.len()` denotes the exit.

use crate::ast::Stmt;

/// A straight-line statement sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    /// Statements in execution order
    pub stmts: Vec<Stmt>,
    /// Number of live control transfers into this block, kept current by the passes
    pub incoming: u32,
}

impl Block {
    /// Creates a block from a statement list.
    #[must_use]
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts, incoming: 0 }
    }

    /// Returns `true` if the block has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Appends a statement.
    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    /// The trailing jump statement, if the block ends with one.
    #[must_use]
    pub fn terminator(&self) -> Option<&Stmt> {
        self.stmts.last().filter(|s| s.is_jump())
    }

    /// Inserts `stmt` before the trailing jump, or appends it if there is none.
    pub fn insert_before_terminator(&mut self, stmt: Stmt) {
        let position = match self.terminator() {
            Some(_) => self.stmts.len() - 1,
            None => self.stmts.len(),
        };
        self.stmts.insert(position, stmt);
    }

    /// Replaces the statement at `index` and returns the previous one.
    pub fn replace(&mut self, index: usize, stmt: Stmt) -> Option<Stmt> {
        self.stmts
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, stmt))
    }

    /// Removes the statement at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Stmt> {
        (index < self.stmts.len()).then(|| self.stmts.remove(index))
    }

    /// Removes all statements.
    pub fn clear(&mut self) {
        self.stmts.clear();
    }

    /// Returns `true` if control can reach the end of the block and continue with the next.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !self.stmts.last().is_some_and(Stmt::is_terminator)
    }
}

/// The block list of a function or inlined callee.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    /// Blocks, block 0 is the entry
    pub blocks: Vec<Block>,
}

impl Body {
    /// Creates a body from a block list.
    #[must_use]
    pub fn new(blocks: Vec<Block>) -> Self {
        Body { blocks }
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the body has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of statements over all blocks.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| b.stmts.iter())
            .filter(|s| !matches!(s, Stmt::Nop))
            .count()
    }

    /// Iterates over all statements in block order.
    pub fn stmts(&self) -> impl Iterator<Item = &Stmt> {
        self.blocks.iter().flat_map(|b| b.stmts.iter())
    }

    /// Mutable iteration over all statements in block order.
    pub fn stmts_mut(&mut self) -> impl Iterator<Item = &mut Stmt> {
        self.blocks.iter_mut().flat_map(|b| b.stmts.iter_mut())
    }

    /// Indices of the blocks holding at least one statement.
    #[must_use]
    pub fn non_empty_blocks(&self) -> Vec<usize> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(index, _)| index)
            .collect()
    }

    /// Recomputes the incoming jump counters of all blocks.
    ///
    /// Only blocks reachable from block 0 contribute: every jump and every fallthrough from a
    /// reachable block counts one transfer into its target.
    pub fn recount_incoming(&mut self) {
        let count = self.blocks.len();
        let mut incoming = vec![0u32; count];
        let mut reached = vec![false; count];
        let mut worklist = Vec::new();
        if count > 0 {
            reached[0] = true;
            worklist.push(0);
        }

        while let Some(index) = worklist.pop() {
            let block = &self.blocks[index];
            let mut targets: Vec<usize> =
                block.stmts.iter().flat_map(Stmt::jump_targets).collect();
            if block.falls_through() {
                targets.push(index + 1);
            }
            for target in targets {
                if target < count {
                    incoming[target] += 1;
                    if !reached[target] {
                        reached[target] = true;
                        worklist.push(target);
                    }
                }
            }
        }

        for (block, count) in self.blocks.iter_mut().zip(incoming) {
            block.incoming = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, VarId};

    #[test]
    fn insert_before_terminator() {
        let mut block = Block::new(vec![Stmt::Eval(Expr::int(1)), Stmt::Goto(3)]);
        block.insert_before_terminator(Stmt::assign(VarId(0), Expr::int(2)));
        assert_eq!(block.stmts.len(), 3);
        assert_eq!(block.stmts[2], Stmt::Goto(3));

        let mut open = Block::new(vec![Stmt::Eval(Expr::int(1))]);
        open.insert_before_terminator(Stmt::Nop);
        assert_eq!(open.stmts.last(), Some(&Stmt::Nop));
    }

    #[test]
    fn incoming_counts() {
        let mut body = Body::new(vec![
            Block::new(vec![Stmt::Goto(2)]),
            Block::new(vec![Stmt::Return(None)]),
            Block::new(vec![Stmt::Eval(Expr::int(0))]),
            Block::new(vec![Stmt::Goto(2)]),
        ]);
        body.recount_incoming();
        let counts: Vec<u32> = body.blocks.iter().map(|b| b.incoming).collect();
        assert_eq!(counts, vec![0, 0, 2, 1]);
    }
}
