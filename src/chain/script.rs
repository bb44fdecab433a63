/// Declarative chain scripts
///
/// A script describes a chain as JSON: each step fails a fixed number of
/// times before passing, optionally requires fields in the running context,
/// and writes fields on success. Scripts drive the `chain` subcommand and
/// make recovery behaviour reproducible without writing code.
use super::sequencer::ValidationChain;
use super::step::ValidationStep;
use crate::context::Context;
use crate::recovery::{RecoveryEngine, ValidationOutcome};
use crate::{EngineError, EngineResult, Failure};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub name: String,

    #[serde(default = "default_required")]
    pub required: bool,

    /// Checks that fail before the step starts passing
    #[serde(default)]
    pub fail_times: u32,

    /// Failure message reported while failing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Report failures as errors rather than failed outcomes
    #[serde(default)]
    pub throws: bool,

    /// Fields written into the context on success
    #[serde(default)]
    pub writes: Context,

    /// Fields that must already hold these values for the step to pass
    #[serde(default)]
    pub expects: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainScript {
    pub name: String,

    /// Initial context
    #[serde(default)]
    pub context: Context,

    pub steps: Vec<ScriptStep>,
}

impl ChainScript {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidScript("chain name is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(EngineError::InvalidScript(format!(
                    "step with empty name in chain '{}'",
                    self.name
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(EngineError::InvalidScript(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }
        Ok(())
    }

    /// Compile into a chain bound to `engine`
    pub fn build(&self, engine: Arc<RecoveryEngine>) -> ValidationChain {
        self.steps
            .iter()
            .fold(ValidationChain::with_engine(&self.name, engine), |chain, step| {
                chain.add_validation(step.to_step())
            })
    }
}

impl ScriptStep {
    fn to_step(&self) -> ValidationStep {
        let calls = Arc::new(AtomicU32::new(0));
        let spec = Arc::new(self.clone());

        let step = ValidationStep::new(self.name.clone(), move |ctx: Context| {
            let calls = Arc::clone(&calls);
            let spec = Arc::clone(&spec);
            async move { spec.check(&ctx, calls.fetch_add(1, Ordering::SeqCst)) }
        });

        step.required(self.required)
    }

    fn check(&self, context: &Context, call: u32) -> Result<ValidationOutcome, Failure> {
        let failure = if call < self.fail_times {
            Some(Failure::new(
                self.error.clone().unwrap_or_else(|| "Validation failed".to_string()),
            ))
        } else if !context.contains_all(&self.expects) {
            Some(Failure::new(format!(
                "Step '{}' is missing required context fields",
                self.name
            )))
        } else {
            None
        };

        match failure {
            None => Ok(ValidationOutcome::passed_with(self.writes.clone())),
            Some(failure) if self.throws => Err(failure),
            Some(failure) => Ok(ValidationOutcome::failed(failure)),
        }
    }
}
