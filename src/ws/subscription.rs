//! Per-connection record of joined patterns.
//!
//! Tracks which patterns a WebSocket client has joined so they can all be
//! left when the connection closes.

use std::collections::HashSet;

use crate::domain::Pattern;

/// The set of patterns a single WebSocket connection is bound to.
#[derive(Debug, Default)]
pub struct JoinedPatterns {
    patterns: HashSet<Pattern>,
}

impl JoinedPatterns {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a joined pattern.
    pub fn insert(&mut self, pattern: Pattern) {
        self.patterns.insert(pattern);
    }

    /// Forgets a pattern. Returns `true` if it was recorded.
    pub fn remove(&mut self, pattern: &Pattern) -> bool {
        self.patterns.remove(pattern)
    }

    /// Returns `true` if the pattern is recorded.
    #[must_use]
    pub fn contains(&self, pattern: &Pattern) -> bool {
        self.patterns.contains(pattern)
    }

    /// Returns the number of joined patterns.
    #[must_use]
    pub fn count(&self) -> usize {
        self.patterns.len()
    }

    /// Empties the set, returning every pattern it held.
    pub fn drain(&mut self) -> Vec<Pattern> {
        self.patterns.drain().collect()
    }
}
