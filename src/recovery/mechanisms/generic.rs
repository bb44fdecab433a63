/// Fallback strategies for unrecognised failures
use crate::context::Context;
use crate::recovery::strategy::{StrategyAction, StrategyOutcome};
use crate::Failure;
use async_trait::async_trait;

/// Record the failure and retry with the context unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAndRetry;

#[async_trait]
impl StrategyAction for LogAndRetry {
    async fn apply(&self, failure: &Failure, context: &Context) -> StrategyOutcome {
        tracing::error!(error = %failure, "Unclassified failure, retrying");
        StrategyOutcome::applied("Logged error and retrying", context.clone())
    }
}

/// Discard all accumulated state
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetContext;

#[async_trait]
impl StrategyAction for ResetContext {
    async fn apply(&self, _failure: &Failure, _context: &Context) -> StrategyOutcome {
        StrategyOutcome::applied("Reset state", Context::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generic_strategies() {
        let ctx = Context::new().with("a", 1);

        let logged = LogAndRetry.apply(&Failure::new("odd"), &ctx).await;
        assert!(logged.success);
        assert_eq!(logged.context, ctx);

        let reset = ResetContext.apply(&Failure::new("odd"), &ctx).await;
        assert!(reset.success);
        assert!(reset.context.is_empty());
    }
}
