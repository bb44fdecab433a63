/// Request input sanitisation and default filling
use crate::context::{keys, Context};
use crate::recovery::strategy::{StrategyAction, StrategyOutcome};
use crate::Failure;
use async_trait::async_trait;
use serde_json::Value;

/// Trim strings and strip angle brackets, recursing into arrays and objects
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().replace(['<', '>'], "")),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Sanitise the `input` entry of the context
#[derive(Debug, Clone, Copy, Default)]
pub struct SanitizeInput;

#[async_trait]
impl StrategyAction for SanitizeInput {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        match context.get(keys::INPUT) {
            Some(input) => StrategyOutcome::applied(
                "Sanitized input",
                context.clone().with(keys::INPUT, sanitize_value(input)),
            ),
            None => StrategyOutcome::failed("No input to sanitize", context.clone()),
        }
    }
}

/// Fill keys missing from the context with injected defaults
pub struct ApplyDefaults {
    defaults: Context,
}

impl ApplyDefaults {
    pub fn new(defaults: Context) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl StrategyAction for ApplyDefaults {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        // Existing values win over defaults
        let mut next = self.defaults.clone();
        next.merge(context);
        next.insert(keys::USE_DEFAULTS, true);

        StrategyOutcome::applied("Applied default values", next)
    }
}
