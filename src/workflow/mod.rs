//! Workflow layer - a run as a sequence of durable steps
//!
//! This module provides:
//! - StepRunner for checkpointed, replayable units of work
//! - CodeWorkflow, the end-to-end run from trigger event to persisted outcome

mod code;
mod step;

pub use code::{CodeWorkflow, SAVE_RESULT_STEP, WorkflowConfig};
pub use step::StepRunner;
