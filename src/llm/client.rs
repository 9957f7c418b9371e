//! LLM client trait and a scripted client for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, SandloopError};
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call carries its full conversation
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Default model identifier
    fn model(&self) -> &str;

    /// Whether the client can make calls
    fn is_ready(&self) -> bool;
}

/// Text the mock answers with once its script runs out
pub const MOCK_IDLE_RESPONSE: &str = "Still working on it.";

/// Scripted client: returns queued responses in order and records every request.
///
/// Once the script is drained it keeps answering with a plain text response
/// that never carries a completion marker.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
    fail_with: Option<String>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// A client whose every call fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }

    /// Number of completed calls
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Snapshot of all requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if let Some(message) = &self.fail_with {
            return Err(SandloopError::Llm(message.clone()));
        }

        self.requests
            .lock()
            .map_err(|e| SandloopError::Llm(e.to_string()))?
            .push(request);

        let next = self
            .responses
            .lock()
            .map_err(|e| SandloopError::Llm(e.to_string()))?
            .pop_front();

        Ok(next.unwrap_or_else(|| CompletionResponse::text(MOCK_IDLE_RESPONSE)))
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn is_ready(&self) -> bool {
        true
    }
}
