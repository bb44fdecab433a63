/// Storage reconnection and schema verification
use crate::context::{keys, Context};
use crate::recovery::strategy::{StrategyAction, StrategyOutcome};
use crate::Failure;
use async_trait::async_trait;
use std::sync::Arc;

/// Maintenance hooks of the storage engine behind the failing operation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreMaintenance: Send + Sync {
    /// Drop and re-establish the connection
    async fn reconnect(&self) -> anyhow::Result<()>;

    /// Verify the schema, repairing it where possible
    async fn verify_schema(&self) -> anyhow::Result<()>;
}

/// Store without maintenance hooks; every operation trivially succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl StoreMaintenance for NoopStore {
    async fn reconnect(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn verify_schema(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct Reconnect {
    store: Arc<dyn StoreMaintenance>,
}

impl Reconnect {
    pub fn new(store: Arc<dyn StoreMaintenance>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StrategyAction for Reconnect {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        match self.store.reconnect().await {
            Ok(()) => StrategyOutcome::applied(
                "Reconnected to database",
                context.clone().with(keys::RECONNECTED, true),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Database reconnect failed");
                StrategyOutcome::failed(format!("Reconnect failed: {:#}", e), context.clone())
            }
        }
    }
}

pub struct RepairSchema {
    store: Arc<dyn StoreMaintenance>,
}

impl RepairSchema {
    pub fn new(store: Arc<dyn StoreMaintenance>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StrategyAction for RepairSchema {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        match self.store.verify_schema().await {
            Ok(()) => StrategyOutcome::applied(
                "Verified database schema",
                context.clone().with(keys::SCHEMA_CHECKED, true),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Schema verification failed");
                StrategyOutcome::failed(
                    format!("Schema verification failed: {:#}", e),
                    context.clone(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reconnect_marks_context() {
        let mut store = MockStoreMaintenance::new();
        store.expect_reconnect().times(1).returning(|| Ok(()));

        let strategy = Reconnect::new(Arc::new(store));
        let outcome = strategy
            .apply(&Failure::new("database locked"), &Context::new().with("k", 1))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.context.get_bool(keys::RECONNECTED), Some(true));
        assert_eq!(outcome.context.get_u64("k"), Some(1));
    }

    #[tokio::test]
    async fn test_reconnect_error_reports_failure() {
        let mut store = MockStoreMaintenance::new();
        store
            .expect_reconnect()
            .returning(|| Err(anyhow::anyhow!("socket closed")));

        let strategy = Reconnect::new(Arc::new(store));
        let ctx = Context::new();
        let outcome = strategy.apply(&Failure::new("database locked"), &ctx).await;

        assert!(!outcome.success);
        assert!(outcome.action.contains("socket closed"));
        assert_eq!(outcome.context, ctx);
    }

    #[tokio::test]
    async fn test_schema_check() {
        let mut store = MockStoreMaintenance::new();
        store.expect_verify_schema().times(1).returning(|| Ok(()));
        store.expect_reconnect().never();

        let strategy = RepairSchema::new(Arc::new(store));
        let outcome = strategy
            .apply(&Failure::new("SQLITE_CORRUPT"), &Context::new())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.context.get_bool(keys::SCHEMA_CHECKED), Some(true));
    }

    #[tokio::test]
    async fn test_noop_store() {
        let strategy = RepairSchema::new(Arc::new(NoopStore));
        assert!(strategy.apply(&Failure::new("x"), &Context::new()).await.success);
    }
}
