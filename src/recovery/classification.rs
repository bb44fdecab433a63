/// Failure classification for strategy selection
///
/// This module maps a failure onto one of a fixed set of categories that
/// decide which remediation strategies are tried. Classification is a pure
/// function of the failure: an explicit category tag wins, otherwise an
/// ordered keyword rule table is evaluated and the first match decides.
use crate::Failure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a failure, selecting its remediation strategies
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    /// Remote-procedure / provider connectivity problems
    RpcError,

    /// Storage engine problems
    DatabaseError,

    /// Malformed or unrecognised addresses
    AddressValidationError,

    /// Timeouts and refused connections
    NetworkTimeout,

    /// Missing or malformed request input
    ApiValidationError,

    /// Anything not recognised by the rules above
    GenericError,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 6] = [
        FailureCategory::RpcError,
        FailureCategory::DatabaseError,
        FailureCategory::AddressValidationError,
        FailureCategory::NetworkTimeout,
        FailureCategory::ApiValidationError,
        FailureCategory::GenericError,
    ];

    /// Get human-readable description of the category
    pub fn description(&self) -> &'static str {
        match self {
            FailureCategory::RpcError => "Remote provider or RPC connectivity failure",
            FailureCategory::DatabaseError => "Storage engine failure",
            FailureCategory::AddressValidationError => "Address failed format validation",
            FailureCategory::NetworkTimeout => "Network timeout or refused connection",
            FailureCategory::ApiValidationError => "Request input failed validation",
            FailureCategory::GenericError => "Unrecognised failure",
        }
    }

    /// Stable tag used in logs and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::RpcError => "RPC_ERROR",
            FailureCategory::DatabaseError => "DATABASE_ERROR",
            FailureCategory::AddressValidationError => "ADDRESS_VALIDATION_ERROR",
            FailureCategory::NetworkTimeout => "NETWORK_TIMEOUT",
            FailureCategory::ApiValidationError => "API_VALIDATION_ERROR",
            FailureCategory::GenericError => "GENERIC_ERROR",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FailureCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown failure category: {}", s))
    }
}

/// Maps a failure to its category.
///
/// The engine depends only on this trait, so structured error types can
/// replace message inspection without touching recovery control flow.
pub trait Classifier: Send + Sync {
    fn classify(&self, failure: &Failure) -> FailureCategory;
}

impl<F> Classifier for F
where
    F: Fn(&Failure) -> FailureCategory + Send + Sync,
{
    fn classify(&self, failure: &Failure) -> FailureCategory {
        self(failure)
    }
}

/// How a rule's keywords are matched against a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordMatch {
    /// At least one keyword occurs
    Any(Vec<String>),

    /// Every keyword occurs
    All(Vec<String>),
}

impl KeywordMatch {
    pub fn any<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeywordMatch::Any(keywords.into_iter().map(Into::into).collect())
    }

    pub fn all<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeywordMatch::All(keywords.into_iter().map(Into::into).collect())
    }

    /// Case-sensitive substring match
    pub fn matches(&self, message: &str) -> bool {
        match self {
            KeywordMatch::Any(words) => words.iter().any(|w| message.contains(w.as_str())),
            KeywordMatch::All(words) => {
                !words.is_empty() && words.iter().all(|w| message.contains(w.as_str()))
            }
        }
    }
}

/// One entry of the ordered rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub category: FailureCategory,
    pub keywords: KeywordMatch,
}

impl ClassificationRule {
    pub fn new(category: FailureCategory, keywords: KeywordMatch) -> Self {
        Self { category, keywords }
    }
}

/// Keyword classifier - first matching rule wins, `GenericError` otherwise
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    /// Rules in precedence order
    rules: Vec<ClassificationRule>,

    /// Whether an explicit tag on the failure overrides the rules
    honor_tags: bool,
}

impl ErrorClassifier {
    /// Create a classifier with the default rule table
    pub fn new() -> Self {
        Self {
            rules: Self::default_rules(),
            honor_tags: true,
        }
    }

    /// Classifier without rules; everything untagged is `GenericError`
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            honor_tags: true,
        }
    }

    /// Default precedence: RPC, database, address, network, API validation
    pub fn default_rules() -> Vec<ClassificationRule> {
        vec![
            ClassificationRule::new(
                FailureCategory::RpcError,
                KeywordMatch::any(["RPC", "provider", "ENOTFOUND"]),
            ),
            ClassificationRule::new(
                FailureCategory::DatabaseError,
                KeywordMatch::any(["database", "sqlite", "SQLITE"]),
            ),
            ClassificationRule::new(
                FailureCategory::AddressValidationError,
                KeywordMatch::all(["address", "invalid"]),
            ),
            ClassificationRule::new(
                FailureCategory::NetworkTimeout,
                KeywordMatch::any(["timeout", "ETIMEDOUT", "ECONNREFUSED"]),
            ),
            ClassificationRule::new(
                FailureCategory::ApiValidationError,
                KeywordMatch::any(["validation", "required"]),
            ),
        ]
    }

    /// Append a rule with lower precedence than the existing ones
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Classify by message only, even for tagged failures
    pub fn ignore_tags(mut self) -> Self {
        self.honor_tags = false;
        self
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Evaluate the rule table against a message
    pub fn classify_message(&self, message: &str) -> FailureCategory {
        self.rules
            .iter()
            .find(|rule| rule.keywords.matches(message))
            .map(|rule| rule.category)
            .unwrap_or(FailureCategory::GenericError)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for ErrorClassifier {
    fn classify(&self, failure: &Failure) -> FailureCategory {
        match failure.category() {
            Some(tag) if self.honor_tags => tag,
            _ => self.classify_message(failure.message()),
        }
    }
}
