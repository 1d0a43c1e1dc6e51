//! Append-only string interning.
//!
//! Strings (entity type names, client IDs referenced from saved state,
//! etc.) are interned once and referenced by index thereafter, so
//! snapshots carry small integers instead of repeated string data. The
//! registry only ever grows -- it is restored wholesale on snapshot load,
//! never diffed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct StringId(pub u32);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StringRegistryState {
    pub strings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct StringRegistry {
    strings: Vec<String>,
    by_value: HashMap<String, StringId>,
}

impl StringRegistry {
    pub fn new() -> StringRegistry {
        StringRegistry::default()
    }

    pub fn intern(&mut self, value: &str) -> StringId {
        if let Some(&id) = self.by_value.get(value) {
            return id;
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(value.to_owned());
        self.by_value.insert(value.to_owned(), id);
        id
    }

    pub fn resolve(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(|s| s.as_str())
    }

    pub fn lookup(&self, value: &str) -> Option<StringId> {
        self.by_value.get(value).copied()
    }

    pub fn snapshot_state(&self) -> StringRegistryState {
        StringRegistryState {
            strings: self.strings.clone(),
        }
    }

    pub fn restore_from_state(state: &StringRegistryState) -> StringRegistry {
        let mut registry = StringRegistry::new();
        for s in &state.strings {
            registry.intern(s);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut reg = StringRegistry::new();
        let a = reg.intern("hello");
        let b = reg.intern("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_round_trip() {
        let mut reg = StringRegistry::new();
        let id = reg.intern("world");
        assert_eq!(reg.resolve(id), Some("world"));
    }

    #[test]
    fn restore_preserves_ids() {
        let mut reg = StringRegistry::new();
        reg.intern("a");
        reg.intern("b");
        let state = reg.snapshot_state();
        let restored = StringRegistry::restore_from_state(&state);
        assert_eq!(restored.lookup("a"), reg.lookup("a"));
        assert_eq!(restored.lookup("b"), reg.lookup("b"));
    }
}
