/// Recovery engine - drives classify, select, apply, validate, escalate
///
/// Each call is an explicit bounded loop. The failure identity is computed
/// once on entry; every unsuccessful pass bumps its counter, which moves
/// selection one strategy further down the category's priority list. The
/// counter is removed on recovery, on escalation, and when the call is
/// dropped before finishing. Calls without a correlation id count on a
/// counter of their own.
use super::attempts::{error_id, AttemptScope, AttemptTracker};
use super::classification::{Classifier, ErrorClassifier, FailureCategory};
use super::log::{RecoveryLog, RecoveryLogEntry};
use super::mechanisms::{builtin_registry, Collaborators};
use super::strategy::{Strategy, StrategyOutcome, StrategyRegistry};
use super::validation::{panic_message, run_validation, ValidateFn, ValidationOutcome};
use crate::context::Context;
use crate::settings::RecoveryConfig;
use crate::Failure;
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

lazy_static::lazy_static! {
    static ref GLOBAL_ENGINE: Arc<RecoveryEngine> = Arc::new(RecoveryEngine::from_environment());
}

/// Outcome of a recovery call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub recovered: bool,

    /// Strategy whose application led to recovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    pub attempts: u32,

    /// Context to resume with
    pub context: Context,

    #[serde(default)]
    pub requires_manual_intervention: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,

    /// Category of the failure last handled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,

    /// Message of the failure being handled at escalation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Validation outcome that confirmed the recovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutcome>,
}

impl RecoveryResult {
    /// Result produced by caller-supplied recovery logic
    pub fn custom(recovered: bool, attempts: u32, context: Context) -> Self {
        Self {
            recovered,
            strategy: None,
            attempts,
            context,
            requires_manual_intervention: !recovered,
            error_id: None,
            category: None,
            error: None,
            validation: None,
        }
    }

    pub fn is_escalated(&self) -> bool {
        !self.recovered && self.requires_manual_intervention
    }

    /// Response body for HTTP-facing callers; `None` unless escalated
    pub fn escalation_report(&self) -> Option<EscalationReport> {
        self.is_escalated().then(|| EscalationReport {
            status: 500,
            error: "Service temporarily unavailable".to_string(),
            message: "Multiple recovery attempts failed. Please try again later.".to_string(),
            requires_manual_intervention: true,
            error_id: self.error_id.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationReport {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub requires_manual_intervention: bool,
    pub error_id: Option<String>,
}

/// Input to [`RecoveryEngine::execute`]
#[derive(Clone)]
pub struct RecoveryRequest {
    pub failure: Failure,
    pub context: Context,

    /// Scopes the failure identity to one logical caller; without one the
    /// attempt counter is private to the call
    pub correlation_id: Option<String>,

    /// Check re-run after each successful strategy
    pub validation: Option<ValidateFn>,
}

impl RecoveryRequest {
    pub fn new(failure: impl Into<Failure>, context: Context) -> Self {
        Self {
            failure: failure.into(),
            context,
            correlation_id: None,
            validation: None,
        }
    }

    pub fn with_correlation(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_validation(mut self, validation: ValidateFn) -> Self {
        self.validation = Some(validation);
        self
    }
}

pub struct RecoveryEngine {
    config: RecoveryConfig,
    classifier: Arc<dyn Classifier>,
    registry: StrategyRegistry,

    /// Shared by every call on this engine
    attempts: AttemptTracker,
    log: RecoveryLog,
}

impl RecoveryEngine {
    /// Engine with the built-in strategies wired to configuration
    pub fn new(config: RecoveryConfig) -> Self {
        let collaborators = Collaborators::from_settings(&config);
        Self::with_collaborators(config, &collaborators)
    }

    /// Engine with the built-in strategies wired to the given collaborators
    pub fn with_collaborators(config: RecoveryConfig, collaborators: &Collaborators) -> Self {
        let log = RecoveryLog::new(config.log_capacity);
        Self {
            classifier: Arc::new(ErrorClassifier::new()),
            registry: builtin_registry(collaborators),
            attempts: AttemptTracker::new(),
            log,
            config,
        }
    }

    /// Engine configured from defaults, config file and environment
    fn from_environment() -> Self {
        let config = RecoveryConfig::load(None).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default recovery configuration");
            RecoveryConfig::default()
        });
        Self::new(config)
    }

    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Process-wide engine shared by the free functions and default chains
    pub fn global() -> Arc<RecoveryEngine> {
        Arc::clone(&GLOBAL_ENGINE)
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn attempts(&self) -> &AttemptTracker {
        &self.attempts
    }

    pub fn classify(&self, failure: &Failure) -> FailureCategory {
        self.classifier.classify(failure)
    }

    /// Recover without a validation check; the first successful strategy wins
    pub async fn recover(&self, failure: impl Into<Failure>, context: Context) -> RecoveryResult {
        self.execute(RecoveryRequest::new(failure, context)).await
    }

    /// Recover, confirming each successful strategy with `validate`
    pub async fn recover_with(
        &self,
        failure: impl Into<Failure>,
        context: Context,
        validate: ValidateFn,
    ) -> RecoveryResult {
        self.execute(RecoveryRequest::new(failure, context).with_validation(validate))
            .await
    }

    pub async fn execute(&self, request: RecoveryRequest) -> RecoveryResult {
        let RecoveryRequest {
            mut failure,
            mut context,
            correlation_id,
            validation,
        } = request;

        let id = error_id(
            &failure,
            &context,
            correlation_id.as_deref(),
            self.config.error_id_length,
        );
        let scope = match correlation_id {
            Some(_) => self.attempts.scope(id.clone()),
            None => self.attempts.scope(format!("{}:{}", id, Uuid::new_v4())),
        };
        let mut category = self.classify(&failure);
        let max_attempts = self.config.max_attempts;

        tracing::info!(
            error_id = %id,
            category = %category,
            error = %failure,
            "Starting recovery"
        );

        for _ in 0..max_attempts {
            let attempts = scope.get();
            if attempts >= max_attempts {
                break;
            }

            let Some(strategy) = self.registry.select(category, attempts) else {
                tracing::warn!(error_id = %id, category = %category, "No strategy registered");
                break;
            };

            tracing::info!(
                error_id = %id,
                category = %category,
                strategy = strategy.name(),
                attempt = attempts + 1,
                "Applying recovery strategy"
            );

            let outcome = self.apply(strategy, &failure, &context).await;
            self.log.record(RecoveryLogEntry {
                timestamp: Utc::now(),
                error_id: id.clone(),
                category,
                strategy: strategy.name().to_string(),
                success: outcome.success,
                action: outcome.action.clone(),
            });

            context = outcome.context;

            if !outcome.success {
                tracing::warn!(
                    error_id = %id,
                    strategy = strategy.name(),
                    action = %outcome.action,
                    "Recovery strategy did not apply"
                );
                scope.increment();
                continue;
            }

            let Some(validate) = validation.as_ref() else {
                return self.recovered(scope, &id, category, strategy, attempts, context, None);
            };

            match run_validation(validate, context.clone()).await {
                Ok(checked) if checked.success => {
                    if let Some(fields) = checked.context.as_ref() {
                        context.merge(fields);
                    }
                    return self.recovered(
                        scope,
                        &id,
                        category,
                        strategy,
                        attempts,
                        context,
                        Some(checked),
                    );
                }
                Ok(checked) => {
                    tracing::warn!(
                        error_id = %id,
                        strategy = strategy.name(),
                        reason = %checked.failure(),
                        "Validation failed after recovery"
                    );
                    scope.increment();
                }
                Err(thrown) => {
                    tracing::warn!(
                        error_id = %id,
                        strategy = strategy.name(),
                        error = %thrown,
                        "Validation errored after recovery"
                    );
                    scope.increment();
                    failure = thrown;
                    category = self.classify(&failure);
                }
            }
        }

        self.escalate(scope, &id, category, &failure, context)
    }

    /// Apply a strategy; a panic counts as an unsuccessful application
    async fn apply(&self, strategy: &Strategy, failure: &Failure, context: &Context) -> StrategyOutcome {
        match AssertUnwindSafe(strategy.apply(failure, context))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(strategy = strategy.name(), panic = %reason, "Recovery strategy panicked");
                StrategyOutcome::failed(format!("Strategy panicked: {}", reason), context.clone())
            }
        }
    }

    fn recovered(
        &self,
        scope: AttemptScope<'_>,
        id: &str,
        category: FailureCategory,
        strategy: &Strategy,
        attempts: u32,
        context: Context,
        validation: Option<ValidationOutcome>,
    ) -> RecoveryResult {
        scope.release();

        tracing::info!(
            error_id = %id,
            strategy = strategy.name(),
            attempts = attempts + 1,
            "Recovered"
        );

        RecoveryResult {
            recovered: true,
            strategy: Some(strategy.name().to_string()),
            attempts: attempts + 1,
            context,
            requires_manual_intervention: false,
            error_id: Some(id.to_string()),
            category: Some(category),
            error: None,
            validation,
        }
    }

    fn escalate(
        &self,
        scope: AttemptScope<'_>,
        id: &str,
        category: FailureCategory,
        failure: &Failure,
        context: Context,
    ) -> RecoveryResult {
        let attempts = scope.release().unwrap_or(0);

        tracing::error!(
            error_id = %id,
            category = %category,
            error = %failure,
            attempts,
            "Manual intervention required"
        );

        RecoveryResult {
            recovered: false,
            strategy: None,
            attempts,
            context,
            requires_manual_intervention: true,
            error_id: Some(id.to_string()),
            category: Some(category),
            error: Some(failure.message().to_string()),
            validation: None,
        }
    }

    /// Snapshot of the recovery log, oldest first
    pub fn recovery_log(&self) -> Vec<RecoveryLogEntry> {
        self.log.entries()
    }

    /// Clear the log and every in-flight attempt counter
    pub fn clear_recovery_log(&self) {
        self.log.clear();
        self.attempts.clear();
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

/// Recover on the process-wide engine
pub async fn recover(failure: impl Into<Failure>, context: Context) -> RecoveryResult {
    RecoveryEngine::global().recover(failure, context).await
}

/// Recover on the process-wide engine, confirming with `validate`
pub async fn recover_with(
    failure: impl Into<Failure>,
    context: Context,
    validate: ValidateFn,
) -> RecoveryResult {
    RecoveryEngine::global()
        .recover_with(failure, context, validate)
        .await
}

/// Recovery log of the process-wide engine
pub fn recovery_log() -> Vec<RecoveryLogEntry> {
    RecoveryEngine::global().recovery_log()
}

/// Reset the process-wide engine's log and attempt counters
pub fn clear_recovery_log() {
    RecoveryEngine::global().clear_recovery_log()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::validation::validator;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(name: &'static str, priority: u32, succeed: bool) -> Strategy {
        Strategy::from_fn(name, priority, move |_failure, context: Context| async move {
            let context = context.with(name, true);
            if succeed {
                StrategyOutcome::applied(name, context)
            } else {
                StrategyOutcome::failed(name, context)
            }
        })
    }

    fn engine_with(registry: StrategyRegistry) -> RecoveryEngine {
        RecoveryEngine::default().with_registry(registry)
    }

    #[tokio::test]
    async fn test_first_strategy_recovers_without_validation() {
        let engine = engine_with(
            StrategyRegistry::new().with(FailureCategory::GenericError, counting("s1", 1, true)),
        );

        let result = engine.recover("boom", Context::new()).await;
        assert!(result.recovered);
        assert_eq!(result.strategy.as_deref(), Some("s1"));
        assert_eq!(result.attempts, 1);
        assert_eq!(result.context.get_bool("s1"), Some(true));
        assert!(engine.attempts().is_empty());
        assert!(result.escalation_report().is_none());
    }

    #[tokio::test]
    async fn test_failed_strategies_escalate_with_counter_value() {
        let engine = engine_with(
            StrategyRegistry::new()
                .with(FailureCategory::GenericError, counting("s1", 1, false))
                .with(FailureCategory::GenericError, counting("s2", 2, false)),
        );

        let result = engine.recover("boom", Context::new()).await;
        assert!(!result.recovered);
        assert!(result.requires_manual_intervention);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(engine.attempts().is_empty());

        // Failed applications threaded their context forward
        assert_eq!(result.context.get_bool("s1"), Some(true));
        assert_eq!(result.context.get_bool("s2"), Some(true));

        let strategies: Vec<_> = engine.recovery_log().into_iter().map(|e| e.strategy).collect();
        assert_eq!(strategies, vec!["s1", "s2", "s2"]);
    }

    #[tokio::test]
    async fn test_validation_merges_context() {
        let engine = engine_with(
            StrategyRegistry::new().with(FailureCategory::GenericError, counting("s1", 1, true)),
        );
        let check = validator(|_ctx: Context| async move {
            Ok(ValidationOutcome::passed_with(Context::new().with("verified", true)))
        });

        let result = engine.recover_with("boom", Context::new(), check).await;
        assert!(result.recovered);
        assert_eq!(result.context.get_bool("verified"), Some(true));
        assert_eq!(result.context.get_bool("s1"), Some(true));
    }

    #[tokio::test]
    async fn test_validation_error_reclassifies() {
        let engine = RecoveryEngine::default().with_registry(
            StrategyRegistry::new()
                .with(FailureCategory::GenericError, counting("generic", 1, true))
                .with(FailureCategory::DatabaseError, counting("db", 1, true)),
        );

        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let check = validator(move |_ctx: Context| {
            let seen = Arc::clone(&seen);
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Failure::new("database is locked"))
                } else {
                    Ok(ValidationOutcome::passed())
                }
            }
        });

        let result = engine.recover_with("odd failure", Context::new(), check).await;
        assert!(result.recovered);
        assert_eq!(result.strategy.as_deref(), Some("db"));
        assert_eq!(result.category, Some(FailureCategory::DatabaseError));
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_panicking_strategy_counts_as_failure() {
        let engine = engine_with(StrategyRegistry::new().with(
            FailureCategory::GenericError,
            Strategy::from_fn("explodes", 1, |_failure, _context: Context| async move {
                if true {
                    panic!("strategy bug");
                }
                StrategyOutcome::applied("never", Context::new())
            }),
        ));

        let result = engine.recover("boom", Context::new()).await;
        assert!(result.is_escalated());
        let log = engine.recovery_log();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|e| !e.success && e.action.contains("strategy bug")));
    }

    #[tokio::test]
    async fn test_empty_registry_escalates_immediately() {
        let engine = engine_with(StrategyRegistry::new());
        let result = engine.recover("boom", Context::new()).await;
        assert!(result.is_escalated());
        assert_eq!(result.attempts, 0);
        assert!(engine.recovery_log().is_empty());
    }

    #[tokio::test]
    async fn test_escalation_report() {
        let engine = engine_with(
            StrategyRegistry::new().with(FailureCategory::GenericError, counting("s1", 1, false)),
        );
        let result = engine.recover("boom", Context::new()).await;

        let report = result.escalation_report().unwrap();
        assert_eq!(report.status, 500);
        assert!(report.requires_manual_intervention);
        assert_eq!(report.error_id, result.error_id);
    }

    #[tokio::test]
    async fn test_clear_resets_log_and_counters() {
        let engine = engine_with(
            StrategyRegistry::new().with(FailureCategory::GenericError, counting("s1", 1, true)),
        );
        engine.recover("boom", Context::new()).await;
        engine.attempts().increment("stale");

        engine.clear_recovery_log();
        assert!(engine.recovery_log().is_empty());
        assert!(engine.attempts().is_empty());
    }

    #[test]
    fn test_custom_result() {
        let ok = RecoveryResult::custom(true, 1, Context::new());
        assert!(!ok.requires_manual_intervention);

        let failed = RecoveryResult::custom(false, 2, Context::new());
        assert!(failed.is_escalated());
    }
}
