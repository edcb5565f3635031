pub mod config;
pub mod diagnosis;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use diagnosis::{DiagnosisRequest, DiagnosisResult};
pub use error::{CoreError, WorkflowError};
pub use workflow::{StyleWorkflow, WorkflowState};
