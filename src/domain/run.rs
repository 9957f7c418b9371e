//! Run request, trigger event, and the value a run returns to its caller.

use serde::{Deserialize, Serialize};

use super::state::FileMap;
use crate::id::generate_run_id;

/// Title given to every fragment a run produces.
pub const FRAGMENT_TITLE: &str = "Fragment";

/// The user prompt and the conversation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Prompt text
    pub value: String,
    pub conversation_id: String,
}

impl RunRequest {
    pub fn new(value: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Inbound event that starts a run.
///
/// The event id doubles as the run id: redelivering the same event replays
/// its checkpointed steps instead of starting over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub id: String,
    pub data: RunRequest,
}

impl TriggerEvent {
    pub fn new(data: RunRequest) -> Self {
        Self {
            id: generate_run_id(),
            data,
        }
    }

    pub fn with_id(id: impl Into<String>, data: RunRequest) -> Self {
        Self { id: id.into(), data }
    }
}

/// Value handed back to the triggering system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub url: String,
    pub title: String,
    pub files: FileMap,
    /// Blank when the run exhausted its iterations
    pub summary: String,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        !self.summary.trim().is_empty()
    }
}
