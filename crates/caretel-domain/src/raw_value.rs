use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single vendor payload field value.
///
/// Vendor payloads are loosely typed; the same field may arrive as a
/// number in one firmware revision and a quoted string in the next, so
/// the accessors on [`RawPayload`] coerce across variants instead of
/// failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Vendor-defined field map carried inside a raw telemetry envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(pub HashMap<String, RawValue>);

impl RawPayload {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Integer accessor. Accepts integer values, integral floats and
    /// numeric strings; returns `None` for anything else.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            RawValue::Int(v) => Some(*v),
            RawValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            RawValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String accessor. Numbers and booleans are rendered so coded
    /// values like `"posture": 2` and `"posture": "2"` look the same to
    /// terminology lookups.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            RawValue::String(s) => Some(s.clone()),
            RawValue::Int(v) => Some(v.to_string()),
            RawValue::Float(v) => Some(v.to_string()),
            RawValue::Bool(v) => Some(v.to_string()),
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            RawValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Builds a payload from a decoded JSON object, discarding nested
    /// structures (vendor payload shapes are flat scalar maps).
    pub fn from_json_object(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut payload = HashMap::with_capacity(map.len());
        for (key, value) in map {
            if let Some(raw) = raw_value_from_json(value) {
                payload.insert(key.clone(), raw);
            }
        }
        Self(payload)
    }
}

fn raw_value_from_json(value: &serde_json::Value) -> Option<RawValue> {
    match value {
        serde_json::Value::Bool(b) => Some(RawValue::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(RawValue::Int(i))
            } else {
                n.as_f64().map(RawValue::Float)
            }
        }
        serde_json::Value::String(s) => Some(RawValue::String(s.clone())),
        _ => None,
    }
}
