//! The plugin context: a tagged heterogeneous value store threaded through
//! every step of a pipeline run.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A single entry in the plugin context. Variants cover the data shapes
/// builtin and third-party plugins pass between steps; `Nested` lets a
/// plugin build up structured output without a new top-level variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Scalar(serde_json::Value),
    Bytes(Vec<u8>),
    TimeSeries(Vec<(chrono::DateTime<chrono::Utc>, f64)>),
    Image {
        mime_type: String,
        bytes: Vec<u8>,
    },
    Nested(HashMap<String, Value>),
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Scalar(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(serde_json::Value::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(serde_json::Value::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Scalar(serde_json::Value::Number(n.into()))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(|num| Value::Scalar(serde_json::Value::Number(num)))
            .unwrap_or(Value::Scalar(serde_json::Value::Null))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl Value {
    /// Best-effort conversion to a `serde_json::Value`, used when merging
    /// step output into the context or rendering an HTTP response.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Scalar(v) => v.clone(),
            Value::Bytes(b) => serde_json::json!({
                "encoding": "base64",
                "data": general_purpose::STANDARD.encode(b),
            }),
            Value::TimeSeries(points) => serde_json::json!(points
                .iter()
                .map(|(ts, v)| serde_json::json!({ "ts": ts.to_rfc3339(), "value": v }))
                .collect::<Vec<_>>()),
            Value::Image { mime_type, bytes } => serde_json::json!({
                "mime_type": mime_type,
                "encoding": "base64",
                "data": general_purpose::STANDARD.encode(bytes),
            }),
            Value::Nested(map) => {
                let obj: serde_json::Map<String, serde_json::Value> =
                    map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                serde_json::Value::Object(obj)
            }
        }
    }
}

/// Shared, thread-safe key/value store passed to every plugin invocation.
///
/// Reads and writes never cross an `.await` point, so a plain `RwLock`
/// (rather than `tokio::sync::RwLock`) is correct and cheaper here.
#[derive(Clone, Default)]
pub struct Ctx {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl Ctx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().expect("ctx lock poisoned").get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .write()
            .expect("ctx lock poisoned")
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().expect("ctx lock poisoned").remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().expect("ctx lock poisoned").keys().cloned().collect()
    }

    /// Snapshot every entry as plain JSON, e.g. for an HTTP run-status response.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.inner
            .read()
            .expect("ctx lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    /// Fork an independent copy of the current entries. Used to give each
    /// step its own snapshot rather than sharing live mutable state between
    /// concurrently scheduled runs.
    pub fn fork(&self) -> Ctx {
        let snapshot = self.inner.read().expect("ctx lock poisoned").clone();
        Ctx {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Merge another context's entries into this one, overwriting on key
    /// collision. Used to fold a step's local output context back into the
    /// run's global context.
    pub fn merge(&self, other: &Ctx) {
        let incoming = other.inner.read().expect("ctx lock poisoned").clone();
        self.inner.write().expect("ctx lock poisoned").extend(incoming);
    }
}
