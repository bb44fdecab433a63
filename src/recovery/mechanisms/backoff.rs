/// Exponential backoff wait for transient network failures
///
/// delay = min(base * 2^attempt, cap), optionally spread by a jitter factor
/// so concurrent callers do not retry in lockstep.
use crate::context::{keys, Context};
use crate::recovery::strategy::{StrategyAction, StrategyOutcome};
use crate::settings::BackoffSettings;
use crate::Failure;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay for the first retry
    base_delay: Duration,

    /// Maximum delay cap
    max_delay: Duration,

    /// Jitter factor (0.0 - 1.0)
    jitter_factor: f64,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    pub fn from_settings(settings: &BackoffSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        )
        .with_jitter(settings.jitter)
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u128.saturating_pow(attempt);
        let exponential_ms = self.base_delay.as_millis().saturating_mul(factor);
        let capped_ms = exponential_ms.min(self.max_delay.as_millis());

        if self.jitter_factor == 0.0 {
            return Duration::from_millis(capped_ms as u64);
        }

        // delay ± (delay * jitter_factor), never above the cap
        let jitter_range = capped_ms as f64 * self.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        let final_ms = (capped_ms as f64 + jitter)
            .clamp(0.0, self.max_delay.as_millis() as f64);

        Duration::from_millis(final_ms as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_settings(&BackoffSettings::default())
    }
}

/// Sleep for the backoff delay of `retry_attempt`, then bump the counter
pub struct BackoffWait {
    backoff: ExponentialBackoff,
}

impl BackoffWait {
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self { backoff }
    }
}

#[async_trait]
impl StrategyAction for BackoffWait {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        let attempt = context.get_u64(keys::RETRY_ATTEMPT).unwrap_or(0);
        let delay = self
            .backoff
            .delay_for(u32::try_from(attempt).unwrap_or(u32::MAX));

        tracing::debug!(attempt, delay = %humantime::format_duration(delay), "Backing off");
        tokio::time::sleep(delay).await;

        StrategyOutcome::applied(
            format!(
                "Waited {} before retry",
                humantime::format_duration(delay)
            ),
            context.clone().with(keys::RETRY_ATTEMPT, attempt.saturating_add(1)),
        )
    }
}
