//! terminal tool - Run shell commands in the sandbox

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolContext, ToolResult, parse_input};
use crate::domain::IterationState;
use crate::error::Result;

/// Output beyond this many characters is cut off before it reaches the model
pub const MAX_OUTPUT_CHARS: usize = 30_000;

#[derive(Debug, Deserialize)]
struct TerminalInput {
    command: String,
}

pub struct TerminalTool;

fn truncate(output: String) -> String {
    match output.char_indices().nth(MAX_OUTPUT_CHARS) {
        Some((cut, _)) => format!(
            "{}...\n[truncated, {} chars total]",
            &output[..cut],
            output.chars().count()
        ),
        None => output,
    }
}

async fn run_in_sandbox(ctx: &ToolContext<'_>, command: &str) -> Result<ToolResult> {
    let sandbox = ctx.sandbox().await?;

    let mut stdout = String::new();
    let mut stderr = String::new();
    let outcome = ctx
        .session
        .service()
        .exec_command(
            &sandbox,
            command,
            &mut |chunk: &str| stdout.push_str(chunk),
            &mut |chunk: &str| stderr.push_str(chunk),
        )
        .await;

    let failure = match outcome {
        Ok(result) if result.success() => {
            let output = if result.stdout.is_empty() {
                "Command completed with no output".to_string()
            } else {
                result.stdout
            };
            return Ok(ToolResult::success(truncate(output)));
        }
        Ok(result) => format!("exit code {}", result.exit_code),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => e.to_string(),
    };

    log::warn!("Command failed: {} ({})", command, failure);
    let diagnostic = format!("Command failed: {}\nstdout: {}\nstderr: {}", failure, stdout, stderr);
    Ok(ToolResult::error(truncate(diagnostic)))
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn description(&self) -> &'static str {
        "Use the terminal to run commands"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute in the sandbox"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext<'_>, _state: &mut IterationState) -> Result<ToolResult> {
        let input: TerminalInput = parse_input(self.name(), input)?;
        let command = input.command.as_str();

        ctx.steps
            .run(self.name(), || async move { run_in_sandbox(ctx, command).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandloopError;
    use crate::tools::fixture::Fixture;
    use std::time::Duration;

    async fn run(fixture: &Fixture, command: &str) -> Result<ToolResult> {
        let mut state = IterationState::new();
        TerminalTool
            .execute(serde_json::json!({ "command": command }), &fixture.ctx(), &mut state)
            .await
    }

    #[tokio::test]
    async fn test_terminal_echo() {
        let fixture = Fixture::new().await;
        let result = run(&fixture, "echo 'Hello, World!'").await.unwrap();

        assert!(!result.is_error);
        assert_eq!(result.content, "Hello, World!\n");
    }

    #[tokio::test]
    async fn test_terminal_runs_in_sandbox() {
        let fixture = Fixture::new().await;
        std::fs::write(fixture.sandbox_path("marker.txt"), "found").unwrap();

        let result = run(&fixture, "cat marker.txt").await.unwrap();
        assert!(result.content.contains("found"));
    }

    #[tokio::test]
    async fn test_terminal_failure_is_diagnostic() {
        let fixture = Fixture::new().await;
        let result = run(&fixture, "echo partial; echo broken >&2; exit 1").await.unwrap();

        assert!(result.is_error);
        assert!(result.content.starts_with("Command failed: exit code 1"));
        assert!(result.content.contains("stdout: partial"));
        assert!(result.content.contains("stderr: broken"));
    }

    #[tokio::test]
    async fn test_terminal_empty_output() {
        let fixture = Fixture::new().await;
        let result = run(&fixture, "true").await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, "Command completed with no output");
    }

    #[tokio::test]
    async fn test_terminal_missing_command() {
        let fixture = Fixture::new().await;
        let mut state = IterationState::new();
        let err = TerminalTool
            .execute(serde_json::json!({}), &fixture.ctx(), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, SandloopError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_terminal_replays_checkpoint() {
        let fixture = Fixture::new().await;
        run(&fixture, "echo run >> log.txt").await.unwrap();

        let replay = fixture.replay_steps();
        let ctx = ToolContext::new(&fixture.session, &fixture.handle, &replay);
        let mut state = IterationState::new();
        TerminalTool
            .execute(serde_json::json!({"command": "echo run >> log.txt"}), &ctx, &mut state)
            .await
            .unwrap();

        let log = std::fs::read_to_string(fixture.sandbox_path("log.txt")).unwrap();
        assert_eq!(log, "run\n");
    }

    #[tokio::test]
    async fn test_terminal_expired_sandbox_is_fatal() {
        let fixture = Fixture::with_idle_timeout(Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let err = run(&fixture, "echo hi").await.unwrap_err();
        assert!(matches!(err, SandloopError::ExpiredSandbox { .. }));
    }

    #[test]
    fn test_truncate_long_output() {
        let long = "é".repeat(MAX_OUTPUT_CHARS + 10);
        let cut = truncate(long);
        assert!(cut.ends_with(&format!("[truncated, {} chars total]", MAX_OUTPUT_CHARS + 10)));

        assert_eq!(truncate("short".to_string()), "short");
    }
}
