/// Validation steps and their per-step results
use crate::context::Context;
use crate::recovery::{validator, RecoveryResult, ValidateFn, ValidationOutcome};
use crate::Failure;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type SuccessHook = Arc<dyn Fn(&Context) + Send + Sync>;
pub type FailureHook = Arc<dyn Fn(&Context, &Failure) + Send + Sync>;
pub type RecoverFn = Arc<dyn Fn(Failure, Context) -> BoxFuture<'static, RecoveryResult> + Send + Sync>;

/// A named check in a [`ValidationChain`](super::ValidationChain)
#[derive(Clone)]
pub struct ValidationStep {
    name: String,
    validate: ValidateFn,

    /// A failed required step halts the chain
    required: bool,

    on_success: Option<SuccessHook>,
    on_failure: Option<FailureHook>,

    /// Replaces engine recovery for this step
    custom_recovery: Option<RecoverFn>,
}

impl ValidationStep {
    /// Required step backed by an async check
    pub fn new<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ValidationOutcome, Failure>> + Send + 'static,
    {
        Self::from_validator(name, validator(check))
    }

    pub fn from_validator(name: impl Into<String>, validate: ValidateFn) -> Self {
        Self {
            name: name.into(),
            validate,
            required: true,
            on_success: None,
            on_failure: None,
            custom_recovery: None,
        }
    }

    /// Failure of this step is recorded but does not halt the chain
    pub fn optional(self) -> Self {
        self.required(false)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn on_success(mut self, hook: impl Fn(&Context) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_failure(mut self, hook: impl Fn(&Context, &Failure) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    pub fn with_recovery<F, Fut>(mut self, recover: F) -> Self
    where
        F: Fn(Failure, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RecoveryResult> + Send + 'static,
    {
        self.custom_recovery = Some(Arc::new(move |failure: Failure, context: Context| {
            recover(failure, context).boxed()
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn validator(&self) -> &ValidateFn {
        &self.validate
    }

    pub(crate) fn custom_recovery(&self) -> Option<&RecoverFn> {
        self.custom_recovery.as_ref()
    }

    pub(crate) fn notify_success(&self, context: &Context) {
        if let Some(hook) = &self.on_success {
            hook(context);
        }
    }

    pub(crate) fn notify_failure(&self, context: &Context, failure: &Failure) {
        if let Some(hook) = &self.on_failure {
            hook(context, failure);
        }
    }
}

impl fmt::Debug for ValidationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationStep")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("custom_recovery", &self.custom_recovery.is_some())
            .finish_non_exhaustive()
    }
}

/// Result of one step within a chain execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub success: bool,

    /// Passed only after recovery
    pub recovered: bool,

    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub requires_manual_intervention: bool,
}

impl StepResult {
    pub(crate) fn passed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            recovered: false,
            attempts: 1,
            error: None,
            requires_manual_intervention: false,
        }
    }

    pub(crate) fn recovered(name: &str, attempts: u32) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            recovered: true,
            attempts,
            error: None,
            requires_manual_intervention: false,
        }
    }

    pub(crate) fn failed(name: &str, attempts: u32, error: String, escalated: bool) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            recovered: false,
            attempts,
            error: Some(error),
            requires_manual_intervention: escalated,
        }
    }
}
