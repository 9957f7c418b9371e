//! Coding agent - system prompt, model settings, tools and the response hook
//!
//! One call to [`CodingAgent::run_iteration`] is one agent invocation: a model
//! turn, the completion hook, and (if the agent isn't done) the tool calls the
//! model asked for.

mod completion;
mod prompt;

pub use completion::{SUMMARY_CLOSE, SUMMARY_OPEN, extract_completion_signal};
pub use prompt::{CONTINUE_PROMPT, PROMPT};

use std::sync::Arc;

use crate::domain::IterationState;
use crate::error::Result;
use crate::llm::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, Message, Role};
use crate::tools::{ToolContext, ToolExecutor};

/// Name of the coding agent; also the step name of its model calls
pub const AGENT_NAME: &str = "code-agent";

/// Sampling settings for the agent's model calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Overrides the client's default model when set
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 8192,
            temperature: 0.1,
        }
    }
}

/// What happened during one agent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTurn {
    pub response: CompletionResponse,
    /// Tool calls actually executed this turn
    pub tools_run: usize,
    /// The response carried a completion summary
    pub completed: bool,
}

/// LLM-backed agent with a fixed prompt and tool set.
pub struct CodingAgent<L: LlmClient> {
    name: String,
    system: String,
    llm: Arc<L>,
    settings: ModelSettings,
    tools: ToolExecutor,
}

impl<L: LlmClient> CodingAgent<L> {
    /// The standard coding agent: [`PROMPT`] plus the terminal and file tools
    pub fn new(llm: Arc<L>, settings: ModelSettings) -> Self {
        Self {
            name: AGENT_NAME.to_string(),
            system: PROMPT.to_string(),
            llm,
            settings,
            tools: ToolExecutor::standard(),
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_tools(mut self, tools: ToolExecutor) -> Self {
        self.tools = tools;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    fn build_request(&self, conversation: &[Message]) -> CompletionRequest {
        let mut request = CompletionRequest::new(self.system.clone())
            .with_messages(conversation.to_vec())
            .with_tools(self.tools.definitions())
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);
        request.model = self.settings.model.clone();
        request
    }

    /// Response hook: record the summary when the model declares completion.
    fn on_response(&self, response: &CompletionResponse, state: &mut IterationState) -> bool {
        match extract_completion_signal(&response.content) {
            Some(summary) => {
                log::info!("{} reported completion", self.name);
                state.set_summary(summary);
                true
            }
            None => false,
        }
    }

    /// Run one invocation against the shared conversation and state.
    ///
    /// The model call is a durable step named after the agent. Once the hook
    /// finds a summary, tool calls in the same response are not executed.
    pub async fn run_iteration(
        &self,
        conversation: &mut Vec<Message>,
        ctx: &ToolContext<'_>,
        state: &mut IterationState,
    ) -> Result<AgentTurn> {
        let request = self.build_request(conversation);
        let llm = &self.llm;
        let response: CompletionResponse = ctx
            .steps
            .run(&self.name, || async move { llm.complete(request).await })
            .await?;

        let completed = self.on_response(&response, state);
        conversation.push(response.to_message());

        if completed {
            if !response.tool_calls.is_empty() {
                log::info!(
                    "Skipping {} tool call(s) issued alongside the completion summary",
                    response.tool_calls.len()
                );
            }
            return Ok(AgentTurn {
                response,
                tools_run: 0,
                completed,
            });
        }

        if response.tool_calls.is_empty() {
            conversation.push(Message::user(CONTINUE_PROMPT));
            return Ok(AgentTurn {
                response,
                tools_run: 0,
                completed,
            });
        }

        let results = self.tools.execute_all(&response.tool_calls, ctx, state).await?;
        let tools_run = results.len();
        let blocks = results
            .into_iter()
            .map(|(tool_use_id, result)| ContentBlock::ToolResult {
                tool_use_id,
                content: result.content,
                is_error: result.is_error,
            })
            .collect();
        conversation.push(Message::blocks(Role::User, blocks));

        Ok(AgentTurn {
            response,
            tools_run,
            completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MessageContent, MockLlmClient, ToolCall};
    use crate::tools::fixture::Fixture;
    use serde_json::json;

    fn agent(responses: Vec<CompletionResponse>) -> (Arc<MockLlmClient>, CodingAgent<MockLlmClient>) {
        let llm = Arc::new(MockLlmClient::new(responses));
        let agent = CodingAgent::new(llm.clone(), ModelSettings::default());
        (llm, agent)
    }

    fn write_call(id: &str, path: &str, content: &str) -> ToolCall {
        ToolCall::new(
            id,
            "createOrUpdateFiles",
            json!({"files": [{"path": path, "content": content}]}),
        )
    }

    #[tokio::test]
    async fn test_request_carries_prompt_tools_and_sampling() {
        let fixture = Fixture::new().await;
        let (llm, agent) = agent(vec![]);
        let mut conversation = vec![Message::user("add a README")];
        let mut state = IterationState::new();

        agent
            .run_iteration(&mut conversation, &fixture.ctx(), &mut state)
            .await
            .unwrap();

        let requests = llm.requests();
        let request = &requests[0];
        assert_eq!(request.system, PROMPT);
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(8192));
        assert_eq!(request.tools.len(), 3);
        assert_eq!(request.messages, vec![Message::user("add a README")]);
    }

    #[tokio::test]
    async fn test_tool_calls_run_and_results_are_appended() {
        let fixture = Fixture::new().await;
        let (_, agent) = agent(vec![CompletionResponse::tool_use(
            "Writing the README",
            vec![write_call("call_1", "README.md", "hi")],
        )]);
        let mut conversation = vec![Message::user("add a README")];
        let mut state = IterationState::new();

        let turn = agent
            .run_iteration(&mut conversation, &fixture.ctx(), &mut state)
            .await
            .unwrap();

        assert!(!turn.completed);
        assert_eq!(turn.tools_run, 1);
        assert_eq!(state.files["README.md"], "hi");
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[1].role, Role::Assistant);
        match &conversation[2].content {
            MessageContent::Blocks(blocks) => assert!(matches!(
                &blocks[0],
                ContentBlock::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "call_1"
            )),
            other => panic!("expected tool results, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_summary_sets_state() {
        let fixture = Fixture::new().await;
        let (_, agent) = agent(vec![CompletionResponse::text(
            "Done.\n<task_summary>Added README</task_summary>",
        )]);
        let mut conversation = vec![Message::user("add a README")];
        let mut state = IterationState::new();

        let turn = agent
            .run_iteration(&mut conversation, &fixture.ctx(), &mut state)
            .await
            .unwrap();

        assert!(turn.completed);
        assert_eq!(state.summary, "Added README");
        assert!(state.is_complete());
    }

    #[tokio::test]
    async fn test_tool_calls_alongside_summary_are_skipped() {
        let fixture = Fixture::new().await;
        let (_, agent) = agent(vec![CompletionResponse::tool_use(
            "<task_summary>Finished</task_summary>",
            vec![write_call("call_1", "late.txt", "too late")],
        )]);
        let mut conversation = vec![Message::user("go")];
        let mut state = IterationState::new();

        let turn = agent
            .run_iteration(&mut conversation, &fixture.ctx(), &mut state)
            .await
            .unwrap();

        assert!(turn.completed);
        assert_eq!(turn.tools_run, 0);
        assert!(state.files.is_empty());
        assert!(!fixture.sandbox_path("late.txt").exists());
    }

    #[tokio::test]
    async fn test_text_turn_gets_continuation() {
        let fixture = Fixture::new().await;
        let (_, agent) = agent(vec![CompletionResponse::text("Let me think about the layout.")]);
        let mut conversation = vec![Message::user("build a page")];
        let mut state = IterationState::new();

        agent
            .run_iteration(&mut conversation, &fixture.ctx(), &mut state)
            .await
            .unwrap();

        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[2], Message::user(CONTINUE_PROMPT));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let fixture = Fixture::new().await;
        let llm = Arc::new(MockLlmClient::failing("rate limited"));
        let agent = CodingAgent::new(llm, ModelSettings::default());
        let mut conversation = vec![Message::user("go")];
        let mut state = IterationState::new();

        let err = agent
            .run_iteration(&mut conversation, &fixture.ctx(), &mut state)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_model_call_is_checkpointed() {
        let fixture = Fixture::new().await;
        let (llm, agent) = agent(vec![CompletionResponse::text("first answer")]);
        let mut state = IterationState::new();

        let mut conversation = vec![Message::user("go")];
        agent
            .run_iteration(&mut conversation, &fixture.ctx(), &mut state)
            .await
            .unwrap();

        let replay = fixture.replay_steps();
        let ctx = ToolContext::new(&fixture.session, &fixture.handle, &replay);
        let mut conversation = vec![Message::user("go")];
        let turn = agent.run_iteration(&mut conversation, &ctx, &mut state).await.unwrap();

        assert_eq!(turn.response.content, "first answer");
        assert_eq!(llm.call_count(), 1);
    }
}
