//! Tool set exposed to the coding agent
//!
//! Every tool works against the run's sandbox through a [`ToolContext`] and
//! checkpoints its externally visible work as a durable step. Tools that
//! change what the run produced do so through the `&mut IterationState`
//! handed to them for the length of one call.

mod context;
mod executor;
mod read_files;
mod terminal;
mod write_files;

#[cfg(test)]
pub(crate) mod fixture;

pub use context::ToolContext;
pub use executor::ToolExecutor;
pub use read_files::{ReadEntry, ReadFilesTool};
pub use terminal::{MAX_OUTPUT_CHARS, TerminalTool};
pub use write_files::{WriteFilesTool, WriteOutcome};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::IterationState;
use crate::error::{Result, SandloopError};
use crate::llm::ToolDefinition;

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches LLM tool_use name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool.
    ///
    /// Problems the agent can react to come back as an error [`ToolResult`];
    /// `Err` is reserved for failures that end the run or malformed input.
    async fn execute(&self, input: Value, ctx: &ToolContext<'_>, state: &mut IterationState) -> Result<ToolResult>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Deserialize a tool's input, reporting problems back to the model.
pub(crate) fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input).map_err(|e| SandloopError::InvalidInput(format!("{}: {}", tool, e)))
}
