/// Validation predicates used to confirm a recovery
///
/// A validator is an async check over a context. It reports failure either
/// as an outcome with `success == false` or by returning `Err`; a panic is
/// treated the same as `Err`.
use crate::context::Context;
use crate::Failure;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,

    /// Fields to merge into the running context on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

impl ValidationOutcome {
    pub fn passed() -> Self {
        Self {
            success: true,
            error: None,
            context: None,
        }
    }

    pub fn passed_with(context: Context) -> Self {
        Self {
            success: true,
            error: None,
            context: Some(context),
        }
    }

    pub fn failed(error: impl Into<Failure>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            context: None,
        }
    }

    /// The failure this outcome stands for, generic when none was given
    pub fn failure(&self) -> Failure {
        self.error.clone().unwrap_or_else(Failure::validation_failed)
    }
}

pub type ValidateFn =
    Arc<dyn Fn(Context) -> BoxFuture<'static, Result<ValidationOutcome, Failure>> + Send + Sync>;

/// Wrap an async closure as a [`ValidateFn`]
pub fn validator<F, Fut>(f: F) -> ValidateFn
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ValidationOutcome, Failure>> + Send + 'static,
{
    Arc::new(move |context: Context| f(context).boxed())
}

/// Run a validator, converting a panic into `Err`
pub(crate) async fn run_validation(
    validate: &ValidateFn,
    context: Context,
) -> Result<ValidationOutcome, Failure> {
    let validate = Arc::clone(validate);
    match AssertUnwindSafe(async move { validate(context).await })
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => Err(Failure::new(format!(
            "Validation panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
