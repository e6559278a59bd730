//! Configuration for a reification session.
//!
//! The defaults reproduce the reifier's standard behavior: specializations are capped at 50 per
//! method and call shape, only methods annotated with `Inline(true)` (and the callees they
//! reach) are inlined, with a depth budget of 10, and all normalization passes run.

/// Configuration for a [`crate::reify::Reifier`] session.
#[derive(Debug, Clone)]
pub struct ReifierConfig {
    /// Maximum specializations per method and call shape (default: 50).
    pub max_specializations: usize,

    /// Maximum chain of nested inlined callees (default: 10).
    pub max_inline_depth: u32,

    /// Inline context of the entry method, inherited by callees without an `Inline`
    /// annotation (default: false).
    pub inline_by_default: bool,

    /// Maximum statement count of an inlining candidate (default: 64).
    pub inline_max_statements: usize,

    /// Maximum nesting of method explorations before [`crate::Error::RecursionLimit`] is
    /// raised (default: 512).
    pub max_trace_depth: usize,

    /// Run dead code elimination before and after exploration (default: true).
    pub dead_code: bool,

    /// Recover counted `for` loops (default: true).
    pub loop_recovery: bool,

    /// Run object inlining after callees annotated with `InlineObjects` (default: true).
    pub object_inlining: bool,
}

impl Default for ReifierConfig {
    fn default() -> Self {
        Self {
            max_specializations: 50,
            max_inline_depth: 10,
            inline_by_default: false,
            inline_max_statements: 64,
            max_trace_depth: 512,
            dead_code: true,
            loop_recovery: true,
            object_inlining: true,
        }
    }
}

impl ReifierConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that never inlines, whatever the annotations say.
    #[must_use]
    pub fn no_inlining() -> Self {
        Self {
            inline_by_default: false,
            max_inline_depth: 0,
            ..Self::default()
        }
    }

    /// Creates a configuration producing the raw reified form.
    ///
    /// Bodies are traced and call sites are resolved, but no inlining or normalization pass
    /// runs.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            inline_by_default: false,
            max_inline_depth: 0,
            dead_code: false,
            loop_recovery: false,
            object_inlining: false,
            ..Self::default()
        }
    }

    /// Sets the specialization cap.
    ///
    /// # Arguments
    ///
    /// * `max` - Maximum specializations per method and call shape.
    #[must_use]
    pub fn with_max_specializations(mut self, max: usize) -> Self {
        self.max_specializations = max;
        self
    }

    /// Enables or disables inlining.
    ///
    /// # Arguments
    ///
    /// * `enable` - Inline context of the entry method.
    /// * `max_statements` - Maximum statement count of inlined callees.
    #[must_use]
    pub fn with_inlining(mut self, enable: bool, max_statements: usize) -> Self {
        self.inline_by_default = enable;
        self.inline_max_statements = max_statements;
        self
    }

    /// Sets the maximum chain of nested inlined callees.
    #[must_use]
    pub fn with_max_inline_depth(mut self, depth: u32) -> Self {
        self.max_inline_depth = depth;
        self
    }

    /// Sets the exploration depth guard.
    #[must_use]
    pub fn with_max_trace_depth(mut self, depth: usize) -> Self {
        self.max_trace_depth = depth;
        self
    }

    /// Enables or disables the normalization passes.
    ///
    /// # Arguments
    ///
    /// * `dead_code` - Dead code elimination.
    /// * `loop_recovery` - Counted loop recovery.
    /// * `object_inlining` - Object inlining after annotated callees.
    #[must_use]
    pub fn with_passes(mut self, dead_code: bool, loop_recovery: bool, object_inlining: bool) -> Self {
        self.dead_code = dead_code;
        self.loop_recovery = loop_recovery;
        self.object_inlining = object_inlining;
        self
    }
}
