/// Built-in remediation strategies
///
/// Two strategies per failure category, the second more drastic than the
/// first. Every external effect goes through a collaborator injected via
/// [`Collaborators`], so a registry can be built against real services or
/// against test doubles.
pub mod address;
pub mod backoff;
pub mod endpoint;
pub mod generic;
pub mod input;
pub mod storage;

pub use address::{AddressNormalizer, AlternateValidation, HexAddressNormalizer, NormalizeAddress};
pub use backoff::{BackoffWait, ExponentialBackoff};
pub use endpoint::{EndpointDirectory, IncreaseTimeout, StaticEndpoints, SwitchEndpoint};
pub use generic::{LogAndRetry, ResetContext};
pub use input::{sanitize_value, ApplyDefaults, SanitizeInput};
pub use storage::{NoopStore, Reconnect, RepairSchema, StoreMaintenance};

use super::classification::FailureCategory;
use super::strategy::{Strategy, StrategyRegistry};
use crate::context::Context;
use crate::settings::RecoveryConfig;
use std::sync::Arc;

/// Names of the built-in strategies, as reported in results and the log
pub mod names {
    pub const SWITCH_BACKUP_ENDPOINT: &str = "Switch to Backup Endpoint";
    pub const INCREASE_TIMEOUT: &str = "Increase Timeout and Retry";
    pub const RECONNECT_DATABASE: &str = "Reconnect to Database";
    pub const REPAIR_SCHEMA: &str = "Check and Repair Database Schema";
    pub const CORRECT_ADDRESS: &str = "Auto-correct Address Format";
    pub const ALTERNATE_VALIDATION: &str = "Validate with Alternative Method";
    pub const BACKOFF_RETRY: &str = "Exponential Backoff Retry";
    pub const SWITCH_ALTERNATIVE_ENDPOINT: &str = "Switch to Alternative Endpoint";
    pub const SANITIZE_INPUT: &str = "Sanitize and Retry";
    pub const DEFAULT_VALUES: &str = "Use Default Values";
    pub const LOG_AND_RETRY: &str = "Log and Retry";
    pub const RESET_STATE: &str = "Reset State and Retry";
}

/// External services the built-in strategies act on
#[derive(Clone)]
pub struct Collaborators {
    pub endpoints: Arc<dyn EndpointDirectory>,
    pub store: Arc<dyn StoreMaintenance>,
    pub addresses: Arc<dyn AddressNormalizer>,

    /// Values filled in by the defaults strategy
    pub defaults: Context,

    pub backoff: ExponentialBackoff,

    /// Starting point for timeout doubling
    pub default_timeout_ms: u64,
}

impl Collaborators {
    pub fn from_settings(config: &RecoveryConfig) -> Self {
        Self {
            endpoints: Arc::new(StaticEndpoints::new(config.endpoints.iter().cloned())),
            store: Arc::new(NoopStore),
            addresses: Arc::new(HexAddressNormalizer),
            defaults: Context::new(),
            backoff: ExponentialBackoff::from_settings(&config.backoff),
            default_timeout_ms: config.default_timeout_ms,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Arc<dyn EndpointDirectory>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn StoreMaintenance>) -> Self {
        self.store = store;
        self
    }

    pub fn with_addresses(mut self, addresses: Arc<dyn AddressNormalizer>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn with_defaults(mut self, defaults: Context) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::from_settings(&RecoveryConfig::default())
    }
}

/// Registry holding every built-in strategy
pub fn builtin_registry(deps: &Collaborators) -> StrategyRegistry {
    use names::*;

    let mut registry = StrategyRegistry::new();
    registry.register_all(
        FailureCategory::RpcError,
        [
            Strategy::new(SWITCH_BACKUP_ENDPOINT, 1, SwitchEndpoint::new(deps.endpoints.clone())),
            Strategy::new(INCREASE_TIMEOUT, 2, IncreaseTimeout::new(deps.default_timeout_ms)),
        ],
    );
    registry.register_all(
        FailureCategory::DatabaseError,
        [
            Strategy::new(RECONNECT_DATABASE, 1, Reconnect::new(deps.store.clone())),
            Strategy::new(REPAIR_SCHEMA, 2, RepairSchema::new(deps.store.clone())),
        ],
    );
    registry.register_all(
        FailureCategory::AddressValidationError,
        [
            Strategy::new(CORRECT_ADDRESS, 1, NormalizeAddress::new(deps.addresses.clone())),
            Strategy::new(ALTERNATE_VALIDATION, 2, AlternateValidation),
        ],
    );
    registry.register_all(
        FailureCategory::NetworkTimeout,
        [
            Strategy::new(BACKOFF_RETRY, 1, BackoffWait::new(deps.backoff.clone())),
            Strategy::new(
                SWITCH_ALTERNATIVE_ENDPOINT,
                2,
                SwitchEndpoint::new(deps.endpoints.clone()),
            ),
        ],
    );
    registry.register_all(
        FailureCategory::ApiValidationError,
        [
            Strategy::new(SANITIZE_INPUT, 1, SanitizeInput),
            Strategy::new(DEFAULT_VALUES, 2, ApplyDefaults::new(deps.defaults.clone())),
        ],
    );
    registry.register_all(
        FailureCategory::GenericError,
        [
            Strategy::new(LOG_AND_RETRY, 1, LogAndRetry),
            Strategy::new(RESET_STATE, 2, ResetContext),
        ],
    );
    registry
}
