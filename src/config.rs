// ABOUTME: Configuration and constants for the engine and its REPL

use std::time::Duration;

pub const VERSION: &str = "0.9.0";
pub const WELCOME_MESSAGE: &str = "symlisp v0.9";
pub const WELCOME_SUBTITLE: &str = "an S-expression Lisp engine with a two-stage pipeline";

/// Ceiling on macro re-parse rounds for a single form. A macro whose
/// expansion keeps producing macro calls trips this instead of looping.
pub const MAX_EXPANSIONS: usize = 1000;

/// Caps enforced by the textual reader.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Maximum nesting depth of lists.
    pub max_depth: usize,
    /// Maximum number of elements in a single list.
    pub max_list_len: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_depth: 200,
            max_list_len: 65_536,
        }
    }
}

/// Execution limits polled by the computer at each compute step.
///
/// `None` disables the corresponding limit. Nesting counts host-stack
/// recursion (non-tail evaluation), so deep tail recursion is unaffected.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_nesting: Option<usize>,
    pub max_steps: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_nesting: Some(10_000),
            max_steps: None,
            time_limit: None,
        }
    }
}
