//! Runtime limits.

/// Default slot limit for one state's stack.
pub const DEFAULT_MAX_STACK: usize = 8000;

/// Default limit on nested native calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Slots every native function may push without calling `check_stack`.
pub const DEFAULT_MIN_STACK: usize = 20;

/// Limits applied by a [`State`](crate::State).
///
/// ```
/// use hostbind_core::StateConfig;
///
/// let config = StateConfig::default().with_max_call_depth(16);
/// assert_eq!(config.max_call_depth, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateConfig {
    /// Maximum number of live stack slots.
    pub max_stack: usize,
    /// Maximum nesting of native calls made through `call`/`pcall`.
    pub max_call_depth: usize,
    /// Headroom guaranteed on entry to each native call.
    pub min_stack: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_stack: DEFAULT_MAX_STACK,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            min_stack: DEFAULT_MIN_STACK,
        }
    }
}

impl StateConfig {
    pub fn with_max_stack(mut self, max_stack: usize) -> Self {
        self.max_stack = max_stack;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn with_min_stack(mut self, min_stack: usize) -> Self {
        self.min_stack = min_stack;
        self
    }
}
