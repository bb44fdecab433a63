/// Address format correction and alternate validation
use crate::context::{keys, Context};
use crate::recovery::strategy::{StrategyAction, StrategyOutcome};
use crate::Failure;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

lazy_static! {
    /// 20-byte hex account, prefix optional
    static ref HEX_ACCOUNT: Regex = Regex::new(r"^(0[xX])?[0-9a-fA-F]{40}$").unwrap();
}

/// Address kinds that use 0x-prefixed hex accounts
const HEX_KINDS: &[&str] = &["ethereum", "polygon", "binance", "bsc", "arbitrum", "optimism"];

/// Rewrites an address into its canonical textual form
pub trait AddressNormalizer: Send + Sync {
    fn normalize(&self, address: &str, kind: Option<&str>) -> String;
}

/// Trims whitespace; hex accounts are lowercased and given a `0x` prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct HexAddressNormalizer;

impl HexAddressNormalizer {
    fn is_hex_kind(kind: &str) -> bool {
        HEX_KINDS.iter().any(|k| k.eq_ignore_ascii_case(kind))
    }
}

impl AddressNormalizer for HexAddressNormalizer {
    fn normalize(&self, address: &str, kind: Option<&str>) -> String {
        let trimmed = address.trim();

        let hex = match kind {
            Some(kind) => Self::is_hex_kind(kind),
            None => HEX_ACCOUNT.is_match(trimmed),
        };
        if !hex {
            return trimmed.to_string();
        }

        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        format!("0x{}", body.to_ascii_lowercase())
    }
}

pub struct NormalizeAddress {
    normalizer: Arc<dyn AddressNormalizer>,
}

impl NormalizeAddress {
    pub fn new(normalizer: Arc<dyn AddressNormalizer>) -> Self {
        Self { normalizer }
    }
}

#[async_trait]
impl StrategyAction for NormalizeAddress {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        let Some(address) = context.get_str(keys::ADDRESS) else {
            return StrategyOutcome::failed("No address to correct", context.clone());
        };

        let normalized = self
            .normalizer
            .normalize(address, context.get_str(keys::ADDRESS_KIND));

        // Nothing changed means the format was not the problem
        if normalized == address {
            return StrategyOutcome::failed("Address already in canonical form", context.clone());
        }

        StrategyOutcome::applied(
            format!("Corrected address format to {}", normalized),
            context.clone().with(keys::ADDRESS, normalized),
        )
    }
}

/// Ask the validating step to use its alternative validation path
#[derive(Debug, Clone, Copy, Default)]
pub struct AlternateValidation;

#[async_trait]
impl StrategyAction for AlternateValidation {
    async fn apply(&self, _failure: &Failure, context: &Context) -> StrategyOutcome {
        StrategyOutcome::applied(
            "Switched to alternative validation method",
            context.clone().with(keys::VALIDATION_METHOD, "alternative"),
        )
    }
}
