/// Endpoint rotation and timeout escalation
///
/// Used by the RPC and network-timeout categories. The endpoint list is an
/// injected collaborator so strategies never reach into a global provider.
use crate::context::{keys, Context};
use crate::recovery::strategy::{StrategyAction, StrategyOutcome};
use crate::Failure;
use async_trait::async_trait;
use std::sync::Arc;

/// Source of alternative endpoints
pub trait EndpointDirectory: Send + Sync {
    /// Endpoints in rotation order
    fn endpoints(&self) -> Vec<String>;

    /// Endpoint following `current`, wrapping around.
    ///
    /// An unknown or missing current endpoint selects the first one.
    fn next_after(&self, current: Option<&str>) -> Option<String> {
        let endpoints = self.endpoints();
        if endpoints.is_empty() {
            return None;
        }

        let next = current
            .and_then(|c| endpoints.iter().position(|e| e == c))
            .map(|index| (index + 1) % endpoints.len())
            .unwrap_or(0);

        endpoints.into_iter().nth(next)
    }
}

impl<T: EndpointDirectory + ?Sized> EndpointDirectory for Arc<T> {
    fn endpoints(&self) -> Vec<String> {
        (**self).endpoints()
    }

    fn next_after(&self, current: Option<&str>) -> Option<String> {
        (**self).next_after(current)
    }
}

/// Fixed endpoint list, typically from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticEndpoints {
    endpoints: Vec<String>,
}

impl StaticEndpoints {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        }
    }
}

impl EndpointDirectory for StaticEndpoints {
    fn endpoints(&self) -> Vec<String> {
        self.endpoints.clone()
    }
}

/// Move `current_endpoint` to the next endpoint in rotation
pub struct SwitchEndpoint<D> {
    directory: D,
}

impl<D: EndpointDirectory> SwitchEndpoint<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<D: EndpointDirectory> StrategyAction for SwitchEndpoint<D> {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        let current = context.get_str(keys::CURRENT_ENDPOINT);

        match self.directory.next_after(current) {
            Some(next) if Some(next.as_str()) != current => {
                tracing::debug!(from = ?current, to = %next, "Switching endpoint");
                let action = format!("Switched to endpoint {}", next);
                StrategyOutcome::applied(
                    action,
                    context.clone().with(keys::CURRENT_ENDPOINT, next),
                )
            }
            Some(_) => StrategyOutcome::failed("No alternative endpoint available", context.clone()),
            None => StrategyOutcome::failed("No endpoints configured", context.clone()),
        }
    }
}

/// Double `timeout_ms`, starting from a configured default
pub struct IncreaseTimeout {
    default_timeout_ms: u64,
}

impl IncreaseTimeout {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }
}

#[async_trait]
impl StrategyAction for IncreaseTimeout {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        let current = context
            .get_u64(keys::TIMEOUT_MS)
            .unwrap_or(self.default_timeout_ms);
        let doubled = current.saturating_mul(2);

        StrategyOutcome::applied(
            format!("Increased timeout to {}ms", doubled),
            context.clone().with(keys::TIMEOUT_MS, doubled),
        )
    }
}
