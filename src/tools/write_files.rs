//! createOrUpdateFiles tool - Write a batch of files into the sandbox

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Tool, ToolContext, ToolResult, parse_input};
use crate::domain::{FileEntry, IterationState};
use crate::error::{Result, SandloopError};

#[derive(Debug, Deserialize)]
struct WriteFilesInput {
    files: Vec<FileEntry>,
}

/// Checkpointed result of one write batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Every file landed in the sandbox
    Written { files: Vec<FileEntry> },
    /// At least one write failed; nothing is merged into the run's files
    Failed { error: String },
}

pub struct WriteFilesTool;

async fn write_batch(ctx: &ToolContext<'_>, files: &[FileEntry]) -> Result<WriteOutcome> {
    let sandbox = ctx.sandbox().await?;

    for file in files {
        if let Err(e) = ctx.session.service().write_file(&sandbox, &file.path, &file.content).await {
            if e.is_fatal() {
                return Err(e);
            }
            log::warn!("Failed to write {}: {}", file.path, e);
            return Ok(WriteOutcome::Failed {
                error: format!("Failed to create or update files: {}", e),
            });
        }
    }

    Ok(WriteOutcome::Written { files: files.to_vec() })
}

#[async_trait]
impl Tool for WriteFilesTool {
    fn name(&self) -> &'static str {
        "createOrUpdateFiles"
    }

    fn description(&self) -> &'static str {
        "Create or update files in the sandbox"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "files": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": {"type": "string"},
                            "content": {"type": "string"}
                        },
                        "required": ["path", "content"]
                    }
                }
            },
            "required": ["files"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext<'_>, state: &mut IterationState) -> Result<ToolResult> {
        let input: WriteFilesInput = parse_input(self.name(), input)?;
        if input.files.is_empty() {
            return Err(SandloopError::InvalidInput(format!("{}: files must not be empty", self.name())));
        }
        let files = input.files.as_slice();

        let outcome = ctx
            .steps
            .run(self.name(), || async move { write_batch(ctx, files).await })
            .await?;

        match outcome {
            WriteOutcome::Written { files } => {
                // Merge into the state as it is now, not as it was when the call began
                state.merge_files(&files);
                let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
                Ok(ToolResult::success(format!("Updated files: {}", paths.join(", "))))
            }
            WriteOutcome::Failed { error } => Ok(ToolResult::error(error)),
        }
    }
}
