/// Remediation strategies and the per-category strategy registry
///
/// A strategy receives the failure and the current context and reports
/// whether its remediation applied, plus a replacement context. Strategies
/// are grouped by category and ordered by priority; the engine escalates
/// through them as attempts accumulate for the same failure.
use super::classification::FailureCategory;
use crate::context::Context;
use crate::Failure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Result of applying a single strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    /// Whether the remediation applied
    pub success: bool,

    /// Short description of what was done
    pub action: String,

    /// Full replacement for the context
    pub context: Context,
}

impl StrategyOutcome {
    pub fn applied(action: impl Into<String>, context: Context) -> Self {
        Self {
            success: true,
            action: action.into(),
            context,
        }
    }

    pub fn failed(action: impl Into<String>, context: Context) -> Self {
        Self {
            success: false,
            action: action.into(),
            context,
        }
    }
}

/// The behaviour behind a strategy.
///
/// Implementations take their collaborators at construction time; the
/// engine only hands over the failure and the current context.
#[async_trait]
pub trait StrategyAction: Send + Sync {
    async fn apply(&self, failure: &Failure, context: &Context) -> StrategyOutcome;
}

/// Adapter turning an async closure into a [`StrategyAction`]
struct FnAction<F>(F);

#[async_trait]
impl<F, Fut> StrategyAction for FnAction<F>
where
    F: Fn(Failure, Context) -> Fut + Send + Sync,
    Fut: Future<Output = StrategyOutcome> + Send,
{
    async fn apply(&self, failure: &Failure, context: &Context) -> StrategyOutcome {
        (self.0)(failure.clone(), context.clone()).await
    }
}

/// A named, prioritised remediation
#[derive(Clone)]
pub struct Strategy {
    name: String,

    /// Lower runs first
    priority: u32,

    action: Arc<dyn StrategyAction>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, priority: u32, action: impl StrategyAction + 'static) -> Self {
        Self {
            name: name.into(),
            priority,
            action: Arc::new(action),
        }
    }

    /// Build a strategy from an async closure
    pub fn from_fn<F, Fut>(name: impl Into<String>, priority: u32, f: F) -> Self
    where
        F: Fn(Failure, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StrategyOutcome> + Send + 'static,
    {
        Self::new(name, priority, FnAction(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub async fn apply(&self, failure: &Failure, context: &Context) -> StrategyOutcome {
        self.action.apply(failure, context).await
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Strategies per category, each list sorted by ascending priority
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<FailureCategory, Vec<Strategy>>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy; equal priorities keep registration order
    pub fn register(&mut self, category: FailureCategory, strategy: Strategy) {
        let list = self.strategies.entry(category).or_default();
        list.push(strategy);
        list.sort_by_key(Strategy::priority);
    }

    /// Add several strategies for one category, sorting once
    pub fn register_all(
        &mut self,
        category: FailureCategory,
        strategies: impl IntoIterator<Item = Strategy>,
    ) {
        let list = self.strategies.entry(category).or_default();
        list.extend(strategies);
        list.sort_by_key(Strategy::priority);
    }

    /// Builder-style [`StrategyRegistry::register`]
    pub fn with(mut self, category: FailureCategory, strategy: Strategy) -> Self {
        self.register(category, strategy);
        self
    }

    /// Strategies for a category, falling back to the generic ones
    pub fn strategies_for(&self, category: FailureCategory) -> &[Strategy] {
        self.strategies
            .get(&category)
            .filter(|list| !list.is_empty())
            .or_else(|| self.strategies.get(&FailureCategory::GenericError))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pick the strategy for a failure already attempted `attempts` times.
    ///
    /// Escalates one position per prior attempt and stays on the last
    /// strategy once the list is exhausted.
    pub fn select(&self, category: FailureCategory, attempts: u32) -> Option<&Strategy> {
        let list = self.strategies_for(category);
        if list.is_empty() {
            return None;
        }
        let index = (attempts as usize).min(list.len() - 1);
        list.get(index)
    }

    pub fn categories(&self) -> impl Iterator<Item = &FailureCategory> {
        self.strategies.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.values().all(Vec::is_empty)
    }
}
