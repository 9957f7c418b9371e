//! Tool executor - manages tool registration and execution

use std::collections::BTreeMap;

use super::{ReadFilesTool, TerminalTool, Tool, ToolContext, ToolResult, WriteFilesTool};
use crate::domain::IterationState;
use crate::error::Result;
use crate::llm::{ToolCall, ToolDefinition};

/// Manages tool execution for a run
pub struct ToolExecutor {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    /// Create executor with the coding agent's tools
    pub fn standard() -> Self {
        let mut executor = Self::new();
        executor.add_tool(Box::new(TerminalTool));
        executor.add_tool(Box::new(WriteFilesTool));
        executor.add_tool(Box::new(ReadFilesTool));
        executor
    }

    /// Create an empty executor (for custom tool sets)
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Add a tool to the executor
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get tool definitions for LLM, ordered by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a tool call.
    ///
    /// Unknown tools, bad input and recoverable failures become error results
    /// for the model to read. Fatal errors are returned as `Err`.
    pub async fn execute(
        &self,
        tool_call: &ToolCall,
        ctx: &ToolContext<'_>,
        state: &mut IterationState,
    ) -> Result<ToolResult> {
        let Some(tool) = self.tools.get(&tool_call.name) else {
            log::warn!("Model called unknown tool {}", tool_call.name);
            return Ok(ToolResult::error(format!("Unknown tool: {}", tool_call.name)));
        };

        match tool.execute(tool_call.input.clone(), ctx, state).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::warn!("Tool {} failed: {}", tool_call.name, e);
                Ok(ToolResult::error(format!("Tool error: {}", e)))
            }
        }
    }

    /// Execute tool calls in order, pairing each result with its call id
    pub async fn execute_all(
        &self,
        tool_calls: &[ToolCall],
        ctx: &ToolContext<'_>,
        state: &mut IterationState,
    ) -> Result<Vec<(String, ToolResult)>> {
        let mut results = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let result = self.execute(call, ctx, state).await?;
            results.push((call.id.clone(), result));
        }

        Ok(results)
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::standard()
    }
}
