/// Recovery context threaded through strategies and validation steps
///
/// A context is an open, insertion-ordered mapping of JSON values. Each
/// recovery call or chain execution owns its context; strategies and steps
/// receive it by reference and hand back a full replacement.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known keys read and written by the built-in strategies
pub mod keys {
    /// Endpoint currently in use (string)
    pub const CURRENT_ENDPOINT: &str = "current_endpoint";

    /// Operation timeout in milliseconds (integer)
    pub const TIMEOUT_MS: &str = "timeout_ms";

    /// Backoff retry counter (integer)
    pub const RETRY_ATTEMPT: &str = "retry_attempt";

    /// Set once the storage connection has been re-established
    pub const RECONNECTED: &str = "reconnected";

    /// Set once the storage schema has been verified
    pub const SCHEMA_CHECKED: &str = "schema_checked";

    /// Address under validation (string)
    pub const ADDRESS: &str = "address";

    /// Address family, e.g. "ethereum" (string)
    pub const ADDRESS_KIND: &str = "address_kind";

    /// Validation method selected by the alternate-validation strategy
    pub const VALIDATION_METHOD: &str = "validation_method";

    /// Raw caller input subject to sanitisation
    pub const INPUT: &str = "input";

    /// Set once defaults have been applied
    pub const USE_DEFAULTS: &str = "use_defaults";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overlay `other` onto this context: its keys overwrite, none are removed
    pub fn merge(&mut self, other: &Context) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Consuming variant of [`Context::merge`]
    pub fn merged(mut self, other: &Context) -> Self {
        self.merge(other);
        self
    }

    /// True when every key of `expected` is present here with an equal value
    pub fn contains_all(&self, expected: &Context) -> bool {
        expected
            .iter()
            .all(|(key, value)| self.0.get(key) == Some(value))
    }

    /// Stable textual snapshot used for failure identity
    pub fn snapshot(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Context {
    type Error = Value;

    /// Only JSON objects convert; anything else is handed back
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
