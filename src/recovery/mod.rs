/// Failure recovery
///
/// ```text
///   failure + context
///          │
///          ▼
///   ┌──────────────┐    ┌──────────────────┐
///   │  Classifier  │───▶│ StrategyRegistry │  select(category, attempts)
///   └──────────────┘    └────────┬─────────┘
///                                ▼
///                        apply strategy ──────▶ RecoveryLog
///                                │
///                     ┌──────────┴──────────┐
///                     ▼                     ▼
///                 validate              not applied
///                 │      │                  │
///              passed  failed ──────────────┤  AttemptTracker += 1
///                 │                         ▼
///             Recovered              next pass / Escalated
/// ```
pub mod attempts;
pub mod classification;
pub mod engine;
pub mod guard;
pub mod log;
pub mod mechanisms;
pub mod strategy;
pub mod validation;

pub use attempts::{error_id, AttemptScope, AttemptTracker};
pub use classification::{
    ClassificationRule, Classifier, ErrorClassifier, FailureCategory, KeywordMatch,
};
pub use engine::{
    clear_recovery_log, recover, recover_with, recovery_log, EscalationReport, RecoveryEngine,
    RecoveryRequest, RecoveryResult,
};
pub use guard::GuardedOutcome;
pub use log::{RecoveryLog, RecoveryLogEntry};
pub use mechanisms::{builtin_registry, Collaborators};
pub use strategy::{Strategy, StrategyAction, StrategyOutcome, StrategyRegistry};
pub use validation::{validator, ValidateFn, ValidationOutcome};
