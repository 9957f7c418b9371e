//! The code-generation workflow.
//!
//! Steps, in order:
//! 1. `get-sandbox-id`: provision the run's sandbox
//! 2. `get-previous-messages`: load conversation history
//! 3. the network loop, whose model calls and tool calls are steps too
//! 4. `get-sandbox-url`: resolve the preview endpoint
//! 5. `save-result`: commit the outcome record
//!
//! Losing the sandbox (provisioning, expiry) ends the run: an error outcome is
//! committed before the error is returned. Any other error only interrupts the
//! run; nothing is persisted, and replaying the event resumes from the
//! checkpoints and commits the real outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::{CodingAgent, ModelSettings};
use crate::domain::{
    ConversationTurn, FRAGMENT_TITLE, OutcomeRecord, RunRequest, RunResult, TriggerEvent, build_conversation,
};
use crate::error::{Result, SandloopError};
use crate::llm::LlmClient;
use crate::network::{CodeNetwork, DEFAULT_MAX_ITERATIONS};
use crate::sandbox::{DEFAULT_PREVIEW_PORT, DEFAULT_TEMPLATE_ID, SandboxHandle, SandboxService, SandboxSession};
use crate::storage::{MessageStore, StepStore};
use crate::tools::ToolContext;

use super::StepRunner;

/// Key of the outcome commit, shared by the success and failure paths.
pub const SAVE_RESULT_STEP: &str = "save-result";

/// Checkpoint of a committed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedOutcome {
    message_id: String,
    /// The run ended on an error instead of reaching the end of the loop
    aborted: bool,
}

/// Configuration for a CodeWorkflow
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub template_id: String,
    /// Port whose endpoint becomes the fragment's URL
    pub preview_port: u16,
    pub max_iterations: u32,
    /// Number of prior turns replayed to the model
    pub history_limit: usize,
    pub model: ModelSettings,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            preview_port: DEFAULT_PREVIEW_PORT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_limit: 5,
            model: ModelSettings::default(),
        }
    }
}

/// Runs trigger events end to end.
///
/// Holds no per-run state, so one workflow can serve many concurrent runs.
pub struct CodeWorkflow<L: LlmClient> {
    llm: Arc<L>,
    sandboxes: Arc<dyn SandboxService>,
    messages: Arc<dyn MessageStore>,
    steps: Arc<dyn StepStore>,
    config: WorkflowConfig,
}

impl<L: LlmClient> CodeWorkflow<L> {
    pub fn new(
        llm: Arc<L>,
        sandboxes: Arc<dyn SandboxService>,
        messages: Arc<dyn MessageStore>,
        steps: Arc<dyn StepStore>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            llm,
            sandboxes,
            messages,
            steps,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Start a run for a fresh request.
    pub async fn trigger(&self, request: RunRequest) -> Result<RunResult> {
        self.run(&TriggerEvent::new(request)).await
    }

    /// Execute (or resume) the run identified by the event id.
    pub async fn run(&self, event: &TriggerEvent) -> Result<RunResult> {
        let steps = StepRunner::new(event.id.clone(), self.steps.clone());
        let session = SandboxSession::new(self.sandboxes.clone(), self.config.template_id.clone());
        log::info!("[{}] Run started for conversation {}", event.id, event.data.conversation_id);

        if let Some(saved) = steps.checkpoint::<SavedOutcome>(SAVE_RESULT_STEP)? {
            if saved.aborted {
                log::warn!("[{}] Run already ended with outcome {}", event.id, saved.message_id);
                return Err(SandloopError::Step {
                    step: SAVE_RESULT_STEP.to_string(),
                    message: format!("run already ended with error outcome {}", saved.message_id),
                });
            }
        }

        match self.drive(&steps, &session, &event.data).await {
            Ok((result, record)) => {
                self.save_result(&steps, record, false).await?;
                Ok(result)
            }
            Err(e) if e.ends_run() => {
                log::error!("[{}] Run failed: {}", event.id, e);
                let record = OutcomeRecord::failure(&event.data.conversation_id);
                if let Err(persist_err) = self.save_result(&steps, record, true).await {
                    log::error!("[{}] Could not record failure: {}", event.id, persist_err);
                }
                Err(e)
            }
            Err(e) => {
                log::error!("[{}] Run interrupted, replay to resume: {}", event.id, e);
                Err(e)
            }
        }
    }

    /// Everything up to the outcome commit: the run's result and the record to persist.
    async fn drive(
        &self,
        steps: &StepRunner,
        session: &SandboxSession,
        request: &RunRequest,
    ) -> Result<(RunResult, OutcomeRecord)> {
        let handle: SandboxHandle = steps.run("get-sandbox-id", || async move { session.create().await }).await?;

        let messages = &self.messages;
        let conversation_id = request.conversation_id.as_str();
        let limit = self.config.history_limit;
        let history: Vec<ConversationTurn> = steps
            .run("get-previous-messages", || async move {
                messages.load_history(conversation_id, limit)
            })
            .await?;

        let network = CodeNetwork::new(
            CodingAgent::new(self.llm.clone(), self.config.model.clone()),
            self.config.max_iterations,
        );
        let ctx = ToolContext::new(session, &handle, steps);
        let outcome = network.run(build_conversation(&history, &request.value), &ctx).await?;

        let port = self.config.preview_port;
        let handle_ref = &handle;
        let url: String = steps
            .run("get-sandbox-url", || async move {
                let sandbox = session.resolve(handle_ref).await?;
                Ok(session.endpoint(&sandbox, port))
            })
            .await?;

        let record = OutcomeRecord::from_state(conversation_id, &outcome.state, &url);
        let result = RunResult {
            url,
            title: FRAGMENT_TITLE.to_string(),
            files: outcome.state.files,
            summary: outcome.state.summary,
        };
        Ok((result, record))
    }

    /// Commit the run's single outcome; a replay returns the stored message id.
    async fn save_result(&self, steps: &StepRunner, record: OutcomeRecord, aborted: bool) -> Result<String> {
        let messages = &self.messages;
        let saved: SavedOutcome = steps
            .run_keyed(SAVE_RESULT_STEP, || async move {
                messages.insert_message(&record)?;
                log::info!(
                    "Saved {} outcome {} for conversation {}",
                    record.message_type.as_str(),
                    record.id,
                    record.conversation_id
                );
                Ok(SavedOutcome {
                    message_id: record.id,
                    aborted,
                })
            })
            .await?;
        Ok(saved.message_id)
    }
}
