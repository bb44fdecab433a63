/// Guarded execution: run an operation, recovering between failed runs
use super::engine::RecoveryEngine;
use crate::context::Context;
use crate::Failure;
use std::future::Future;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardedOutcome<T> {
    /// The operation eventually succeeded
    Completed {
        value: T,
        context: Context,
        attempts: u32,
    },

    /// Every allowed run failed
    Failed { error: Failure, attempts: u32 },

    /// Recovery escalated; the caller must not retry automatically
    Escalated {
        error: Failure,
        error_id: Option<String>,
        attempts: u32,
    },
}

impl<T> GuardedOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, GuardedOutcome::Completed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            GuardedOutcome::Completed { attempts, .. }
            | GuardedOutcome::Failed { attempts, .. }
            | GuardedOutcome::Escalated { attempts, .. } => *attempts,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            GuardedOutcome::Completed { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl RecoveryEngine {
    /// Run `op` up to `guard_attempts` times.
    ///
    /// After every failed run except the last, the failure is handed to
    /// [`RecoveryEngine::recover`] and the recovered context is merged into
    /// the context of the next run.
    pub async fn run_guarded<T, F, Fut>(&self, context: Context, mut op: F) -> GuardedOutcome<T>
    where
        F: FnMut(Context) -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let max_runs = self.config().guard_attempts;
        let mut context = context;
        let mut last_error = Failure::new("Operation was not attempted");

        for run in 1..=max_runs {
            let error = match op(context.clone()).await {
                Ok(value) => {
                    return GuardedOutcome::Completed {
                        value,
                        context,
                        attempts: run,
                    }
                }
                Err(error) => error,
            };

            if run == max_runs {
                last_error = error;
                break;
            }

            tracing::warn!(run, max_runs, error = %error, "Guarded operation failed, recovering");

            let result = self.recover(error.clone(), context.clone()).await;
            if result.is_escalated() {
                return GuardedOutcome::Escalated {
                    error,
                    error_id: result.error_id,
                    attempts: run,
                };
            }

            context.merge(&result.context);
            last_error = error;
        }

        tracing::error!(runs = max_runs, error = %last_error, "Guarded operation exhausted its runs");
        GuardedOutcome::Failed {
            error: last_error,
            attempts: max_runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::classification::FailureCategory;
    use crate::recovery::strategy::{Strategy, StrategyOutcome, StrategyRegistry};

    fn engine(succeed: bool) -> RecoveryEngine {
        RecoveryEngine::default().with_registry(StrategyRegistry::new().with(
            FailureCategory::GenericError,
            Strategy::from_fn("patch", 1, move |_failure, context: Context| async move {
                let next = context.with("patched", true);
                if succeed {
                    StrategyOutcome::applied("patched", next)
                } else {
                    StrategyOutcome::failed("could not patch", next)
                }
            }),
        ))
    }

    #[tokio::test]
    async fn test_completes_after_recovery() {
        let engine = engine(true);
        let outcome = engine
            .run_guarded(Context::new(), |ctx| async move {
                if ctx.get_bool("patched") == Some(true) {
                    Ok(42)
                } else {
                    Err(Failure::new("not patched yet"))
                }
            })
            .await;

        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.value(), Some(42));
    }

    #[tokio::test]
    async fn test_escalation_stops_retries() {
        let engine = engine(false);
        let mut runs = 0;
        let outcome: GuardedOutcome<()> = engine
            .run_guarded(Context::new(), |_ctx| {
                runs += 1;
                async { Err(Failure::new("always broken")) }
            })
            .await;

        assert!(matches!(outcome, GuardedOutcome::Escalated { attempts: 1, .. }));
        assert_eq!(runs, 1);
    }

    #[tokio::test]
    async fn test_fails_after_last_run() {
        let engine = engine(true);
        let outcome: GuardedOutcome<()> = engine
            .run_guarded(Context::new(), |_ctx| async { Err(Failure::new("still broken")) })
            .await;

        match outcome {
            GuardedOutcome::Failed { error, attempts } => {
                assert_eq!(attempts, 3);
                assert_eq!(error.message(), "still broken");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
