// Allow complex types where needed for boxed validator and strategy closures
#![allow(clippy::type_complexity)]

pub mod chain;
pub mod context;
pub mod recovery;
pub mod settings;

// Re-export the main entry points for convenience
pub use chain::{ChainResult, ChainScript, StepResult, ValidationChain, ValidationStep};
pub use context::Context;
pub use recovery::{
    clear_recovery_log, recover, recover_with, recovery_log, validator, Classifier, ErrorClassifier,
    EscalationReport, FailureCategory, GuardedOutcome, RecoveryEngine, RecoveryLogEntry,
    RecoveryRequest, RecoveryResult, Strategy, StrategyOutcome, StrategyRegistry, ValidateFn,
    ValidationOutcome,
};
pub use settings::RecoveryConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure handed to the recovery engine.
///
/// Collaborators convert whatever went wrong into a `Failure`. The message is
/// what the keyword classifier inspects; an explicit category tag, when set,
/// takes precedence over message inspection.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct Failure {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<FailureCategory>,
}

impl Failure {
    /// Create an untagged failure from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: None,
        }
    }

    /// Create a failure carrying an explicit category
    pub fn tagged(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: Some(category),
        }
    }

    /// Generic failure used when a check reports failure without an error
    pub fn validation_failed() -> Self {
        Self::new("Validation failed")
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> Option<FailureCategory> {
        self.category
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        // Keep the whole cause chain so keyword classification can see it
        Failure::new(format!("{:#}", err))
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Failure::new(err.to_string())
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::new(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::new(message)
    }
}

/// Errors raised by the crate's own plumbing (configuration, scripts, I/O).
///
/// Recovery outcomes are never reported through this type: escalation is
/// returned as data on [`RecoveryResult`].
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid chain script: {0}")]
    InvalidScript(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
