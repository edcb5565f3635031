pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod tests;

pub use orchestrator::{StyleWorkflow, WorkflowModels};
pub use session::{Selection, SessionState, WorkflowState};
