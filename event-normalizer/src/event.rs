//! The canonical event produced by decoders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys every decoder emits, `null` when the sensor does not report them.
pub const CANONICAL_KEYS: [&str; 14] = [
    "type",
    "sensor",
    "src_ip",
    "dest_ip",
    "src_port",
    "dest_port",
    "transport",
    "protocol",
    "vendor_product",
    "app",
    "direction",
    "ids_type",
    "severity",
    "signature",
];

/// One canonical event: a JSON object of string keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedEvent(Map<String, Value>);

impl NormalizedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Attacker address, if the event carries one as a string
    pub fn src_ip(&self) -> Option<&str> {
        self.get("src_ip").and_then(Value::as_str)
    }

    /// Honeypot address, if the event carries one as a string
    pub fn dest_ip(&self) -> Option<&str> {
        self.get("dest_ip").and_then(Value::as_str)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for NormalizedEvent {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
