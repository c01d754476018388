//! Dynamic variables supplied by the host (`#customer`, `#tax rate`).
//!
//! Keys are stored as given. A lookup tries the token exactly as written in
//! the formula first, then its normalized form (spaces to `_`, lowercase).

use std::collections::HashMap;

use sheetlink_engine::engine::{VariableResolver, VariableState};

/// Normalized variable name: spaces become `_`, letters are lowercased.
pub fn normalize_name(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}

#[derive(Clone, Debug, Default)]
pub struct VariableMap {
    entries: HashMap<String, VariableState>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resolved(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .insert(name.to_string(), VariableState::Resolved(value.into()));
    }

    /// Mark a variable as still being fetched.
    pub fn set_pending(&mut self, name: &str) {
        self.entries.insert(name.to_string(), VariableState::Pending);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, token: &str) -> VariableState {
        if let Some(state) = self.entries.get(token) {
            return state.clone();
        }
        self.entries
            .get(&normalize_name(token))
            .cloned()
            .unwrap_or(VariableState::Unresolved)
    }
}

impl VariableResolver for VariableMap {
    fn variable(&self, token: &str) -> VariableState {
        self.get(token)
    }
}
