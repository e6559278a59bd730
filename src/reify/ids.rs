//! Monotonic identifier allocation.

/// Hands out consecutive `u32` identifiers.
///
/// Allocators are owned by the scope whose identifiers they number: the session owns the
/// allocators for allocation sites and synthesized classes, every method tracer owns its own
/// allocators for temporaries and variable identities.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Creates an allocator starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator whose first identifier is `first`.
    #[must_use]
    pub fn starting_at(first: u32) -> Self {
        IdAllocator { next: first }
    }

    /// Returns a fresh identifier.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The identifier the next call to [`IdAllocator::next_id`] returns.
    #[must_use]
    pub fn peek(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive() {
        let mut ids = IdAllocator::starting_at(5);
        assert_eq!(ids.next_id(), 5);
        assert_eq!(ids.next_id(), 6);
        assert_eq!(ids.peek(), 7);
    }
}
