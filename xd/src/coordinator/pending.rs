//! PendingGuessTable - at most one ungraded guess per client

use std::collections::HashMap;

use tracing::debug;

/// Guesses waiting for the operator to grade them
#[derive(Debug, Default)]
pub struct PendingGuessTable {
    slots: HashMap<String, i32>,
}

impl PendingGuessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a guess, replacing any ungraded one. Returns the superseded value.
    pub fn submit(&mut self, name: &str, value: i32) -> Option<i32> {
        let previous = self.slots.insert(name.to_string(), value);
        if let Some(previous) = previous {
            debug!(%name, previous, value, "PendingGuessTable::submit: superseded ungraded guess");
        }
        previous
    }

    /// Remove and return the client's guess
    pub fn take(&mut self, name: &str) -> Option<i32> {
        self.slots.remove(name)
    }

    #[cfg(test)]
    pub(crate) fn peek(&self, name: &str) -> Option<i32> {
        self.slots.get(name).copied()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Drop every pending guess and return how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.slots.len();
        self.slots.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clients with a pending guess, sorted
    pub fn identities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.keys().cloned().collect();
        names.sort();
        names
    }
}
