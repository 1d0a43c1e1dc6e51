//! Per-client latest-input slots.
//!
//! Every input carries a required `frame` (see `DESIGN.md`'s resolution of
//! the distilled spec's open question on this point) and an opaque
//! `serde_json::Value` payload. The registry holds exactly the latest
//! input per client; a system reads it during the `input` phase and it is
//! cleared at the end of the tick it was delivered in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub seq: u64,
    pub frame: u64,
    pub client_id: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InputRegistry {
    latest: BTreeMap<String, Input>,
}

impl InputRegistry {
    pub fn new() -> InputRegistry {
        InputRegistry::default()
    }

    pub fn set(&mut self, input: Input) {
        self.latest.insert(input.client_id.clone(), input);
    }

    pub fn get(&self, client_id: &str) -> Option<&Input> {
        self.latest.get(client_id)
    }

    pub fn clear(&mut self) {
        self.latest.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(client: &str, frame: u64) -> Input {
        Input {
            seq: 1,
            frame,
            client_id: client.to_owned(),
            data: serde_json::json!({"dx": 1}),
        }
    }

    #[test]
    fn set_and_get() {
        let mut reg = InputRegistry::new();
        reg.set(sample("a", 5));
        assert_eq!(reg.get("a").unwrap().frame, 5);
    }

    #[test]
    fn latest_overwrites() {
        let mut reg = InputRegistry::new();
        reg.set(sample("a", 5));
        reg.set(sample("a", 6));
        assert_eq!(reg.get("a").unwrap().frame, 6);
    }

    #[test]
    fn clear_removes_all() {
        let mut reg = InputRegistry::new();
        reg.set(sample("a", 1));
        reg.clear();
        assert!(reg.is_empty());
    }
}
