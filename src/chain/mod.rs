/// Self-recovering validation chains
pub mod script;
pub mod sequencer;
pub mod step;

pub use script::{ChainScript, ScriptStep};
pub use sequencer::{ChainResult, ValidationChain};
pub use step::{StepResult, ValidationStep};
