#![allow(dead_code)]
/// Shared fixtures for integration tests
///
/// Engines with millisecond backoff, counted validators and strategies
/// that record how often they ran.
use recovery_chain::recovery::mechanisms::{builtin_registry, Collaborators, ExponentialBackoff};
use recovery_chain::recovery::{
    validator, FailureCategory, Strategy, StrategyOutcome, StrategyRegistry, ValidateFn,
    ValidationOutcome,
};
use recovery_chain::{Context, Failure, RecoveryConfig, RecoveryEngine};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration with backoff short enough for tests
pub fn fast_config() -> RecoveryConfig {
    let mut config = RecoveryConfig::default();
    config.backoff.base_delay_ms = 1;
    config.backoff.max_delay_ms = 5;
    config
}

/// Engine with the built-in strategies and fast backoff
pub fn test_engine() -> Arc<RecoveryEngine> {
    let config = fast_config();
    let collaborators = Collaborators::from_settings(&config)
        .with_backoff(ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(5)));
    Arc::new(RecoveryEngine::with_collaborators(config, &collaborators))
}

/// Engine using `registry` in place of the built-in strategies
pub fn engine_with(registry: StrategyRegistry) -> Arc<RecoveryEngine> {
    Arc::new(RecoveryEngine::new(fast_config()).with_registry(registry))
}

/// Built-in registry on fast backoff, ready for extra registrations
pub fn fast_registry() -> StrategyRegistry {
    builtin_registry(
        &Collaborators::from_settings(&fast_config())
            .with_backoff(ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(5))),
    )
}

/// Counts invocations shared between a closure and the test body
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicU32>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment, returning the value before the increment
    pub fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Validator failing the first `failures` calls, then passing
pub fn flaky_validator(failures: u32, counter: Counter) -> ValidateFn {
    validator(move |_ctx: Context| {
        let counter = counter.clone();
        async move {
            let call = counter.bump();
            Ok(if call < failures {
                ValidationOutcome::failed(format!("check {} failed", call + 1))
            } else {
                ValidationOutcome::passed()
            })
        }
    })
}

/// Validator that never passes
pub fn failing_validator(counter: Counter) -> ValidateFn {
    flaky_validator(u32::MAX, counter)
}

/// Strategy that always applies and counts its runs
pub fn counted_strategy(name: &'static str, priority: u32, counter: Counter) -> Strategy {
    Strategy::from_fn(name, priority, move |_failure: Failure, context: Context| {
        let counter = counter.clone();
        async move {
            counter.bump();
            StrategyOutcome::applied(name, context)
        }
    })
}

/// Registry of always-applying strategies for one category, in priority order
pub fn registry_of(category: FailureCategory, names: &[&'static str], counter: &Counter) -> StrategyRegistry {
    names
        .iter()
        .enumerate()
        .fold(StrategyRegistry::new(), |registry, (i, name)| {
            registry.with(category, counted_strategy(name, i as u32 + 1, counter.clone()))
        })
}
