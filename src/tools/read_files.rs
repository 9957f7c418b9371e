//! readFiles tool - Read files from the sandbox, best effort

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Tool, ToolContext, ToolResult, parse_input};
use crate::domain::IterationState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct ReadFilesInput {
    files: Vec<String>,
}

/// One requested path and either its content or why it couldn't be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ReadFilesTool;

async fn read_batch(ctx: &ToolContext<'_>, paths: &[String]) -> Result<Vec<ReadEntry>> {
    let sandbox = ctx.sandbox().await?;
    let mut entries = Vec::with_capacity(paths.len());

    for path in paths {
        let entry = match ctx.session.service().read_file(&sandbox, path).await {
            Ok(content) => ReadEntry {
                path: path.clone(),
                content: Some(content),
                error: None,
            },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("Failed to read {}: {}", path, e);
                ReadEntry {
                    path: path.clone(),
                    content: None,
                    error: Some(e.to_string()),
                }
            }
        };
        entries.push(entry);
    }

    Ok(entries)
}

#[async_trait]
impl Tool for ReadFilesTool {
    fn name(&self) -> &'static str {
        "readFiles"
    }

    fn description(&self) -> &'static str {
        "Read files from the sandbox"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "files": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Paths to read"
                }
            },
            "required": ["files"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext<'_>, _state: &mut IterationState) -> Result<ToolResult> {
        let input: ReadFilesInput = parse_input(self.name(), input)?;
        let paths = input.files.as_slice();

        let entries = ctx
            .steps
            .run(self.name(), || async move { read_batch(ctx, paths).await })
            .await?;

        Ok(ToolResult::success(serde_json::to_string(&entries)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixture::Fixture;
    use serde_json::json;

    async fn read(fixture: &Fixture, files: Value) -> Vec<ReadEntry> {
        let mut state = IterationState::new();
        let result = ReadFilesTool
            .execute(json!({ "files": files }), &fixture.ctx(), &mut state)
            .await
            .unwrap();
        assert!(!result.is_error);
        serde_json::from_str(&result.content).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_does_not_abort_batch() {
        let fixture = Fixture::new().await;
        std::fs::write(fixture.sandbox_path("a.txt"), "alpha").unwrap();

        let entries = read(&fixture, json!(["a.txt", "missing.txt"])).await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "a.txt");
        assert_eq!(entries[0].content.as_deref(), Some("alpha"));
        assert!(entries[0].error.is_none());
        assert_eq!(entries[1].path, "missing.txt");
        assert!(entries[1].content.is_none());
        assert!(entries[1].error.as_deref().unwrap().contains("missing.txt"));
    }

    #[tokio::test]
    async fn test_order_follows_request() {
        let fixture = Fixture::new().await;
        for name in ["b.txt", "a.txt", "c.txt"] {
            std::fs::write(fixture.sandbox_path(name), name).unwrap();
        }

        let entries = read(&fixture, json!(["c.txt", "a.txt", "b.txt"])).await;
        let order: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(order, vec!["c.txt", "a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_read_leaves_state_alone() {
        let fixture = Fixture::new().await;
        std::fs::write(fixture.sandbox_path("a.txt"), "alpha").unwrap();

        let mut state = IterationState::new();
        ReadFilesTool
            .execute(json!({"files": ["a.txt"]}), &fixture.ctx(), &mut state)
            .await
            .unwrap();
        assert!(state.files.is_empty());
    }

    #[test]
    fn test_entry_serialization_omits_empty_fields() {
        let entry = ReadEntry {
            path: "a.txt".into(),
            content: Some("x".into()),
            error: None,
        };
        assert_eq!(serde_json::to_value(&entry).unwrap(), json!({"path": "a.txt", "content": "x"}));
    }
}
