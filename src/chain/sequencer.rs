/// Validation chain sequencer
///
/// Steps run strictly in insertion order over one running context. A
/// passing step advances immediately; a failing step is handed to its own
/// recovery hook or to the recovery engine, which re-runs the same check to
/// confirm the fix. Each execution gets a fresh correlation id so attempt
/// counters never leak between executions.
use super::step::{StepResult, ValidationStep};
use crate::context::Context;
use crate::recovery::validation::{panic_message, run_validation};
use crate::recovery::{RecoveryEngine, RecoveryRequest, RecoveryResult};
use crate::Failure;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub chain_name: String,
    pub success: bool,
    pub total_steps: usize,

    /// Index of the halting step, or the step count on a full run
    pub completed_steps: usize,

    pub results: Vec<StepResult>,

    /// Running context at the end of execution
    pub context: Context,
}

impl ChainResult {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn recovered_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.recovered)
    }
}

pub struct ValidationChain {
    name: String,
    steps: Vec<ValidationStep>,
    engine: Arc<RecoveryEngine>,
}

impl ValidationChain {
    /// Chain recovering through the process-wide engine
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_engine(name, RecoveryEngine::global())
    }

    pub fn with_engine(name: impl Into<String>, engine: Arc<RecoveryEngine>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            engine,
        }
    }

    /// Append a step; steps run in the order they were added
    pub fn add_validation(mut self, step: ValidationStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[ValidationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn execute(&self, initial: Context) -> ChainResult {
        let correlation = Uuid::new_v4().to_string();
        let total_steps = self.steps.len();
        let mut context = initial;
        let mut results = Vec::with_capacity(total_steps);

        tracing::info!(chain = %self.name, steps = total_steps, correlation = %correlation, "Executing validation chain");

        for (index, step) in self.steps.iter().enumerate() {
            tracing::info!(chain = %self.name, step = step.name(), index, "Running validation step");

            let failure = match run_validation(step.validator(), context.clone()).await {
                Ok(outcome) if outcome.success => {
                    if let Some(fields) = outcome.context.as_ref() {
                        context.merge(fields);
                    }
                    step.notify_success(&context);
                    results.push(StepResult::passed(step.name()));
                    continue;
                }
                Ok(outcome) => outcome.failure(),
                Err(thrown) => thrown,
            };

            tracing::warn!(chain = %self.name, step = step.name(), error = %failure, "Validation step failed, recovering");

            let recovery = self.recover_step(step, &failure, &context, &correlation).await;

            if recovery.recovered {
                context.merge(&recovery.context);
                step.notify_success(&context);
                tracing::info!(
                    chain = %self.name,
                    step = step.name(),
                    attempts = recovery.attempts,
                    "Validation step recovered"
                );
                results.push(StepResult::recovered(step.name(), recovery.attempts));
                continue;
            }

            step.notify_failure(&context, &failure);
            results.push(StepResult::failed(
                step.name(),
                recovery.attempts,
                recovery.error.unwrap_or_else(|| failure.message().to_string()),
                recovery.requires_manual_intervention,
            ));

            if step.is_required() {
                tracing::error!(chain = %self.name, step = step.name(), index, "Required validation step failed, halting chain");
                return ChainResult {
                    chain_name: self.name.clone(),
                    success: false,
                    total_steps,
                    completed_steps: index,
                    results,
                    context,
                };
            }

            tracing::warn!(chain = %self.name, step = step.name(), "Optional validation step failed, continuing");
        }

        tracing::info!(chain = %self.name, "Validation chain completed");
        ChainResult {
            chain_name: self.name.clone(),
            success: true,
            total_steps,
            completed_steps: total_steps,
            results,
            context,
        }
    }

    async fn recover_step(
        &self,
        step: &ValidationStep,
        failure: &Failure,
        context: &Context,
        correlation: &str,
    ) -> RecoveryResult {
        match step.custom_recovery() {
            Some(custom) => {
                let custom = Arc::clone(custom);
                let (failure, context) = (failure.clone(), context.clone());
                let fallback = context.clone();
                AssertUnwindSafe(async move { custom(failure, context).await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        let reason = panic_message(payload.as_ref());
                        tracing::error!(step = step.name(), panic = %reason, "Custom recovery panicked");
                        let mut result = RecoveryResult::custom(false, 0, fallback);
                        result.error = Some(format!("Custom recovery panicked: {}", reason));
                        result
                    })
            }
            None => {
                let request = RecoveryRequest::new(failure.clone(), context.clone())
                    .with_correlation(correlation)
                    .with_validation(Arc::clone(step.validator()));
                self.engine.execute(request).await
            }
        }
    }
}

impl std::fmt::Debug for ValidationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationChain")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}
