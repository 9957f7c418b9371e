//! Sandloop - a sandboxed coding-agent orchestration loop
//!
//! A run takes a prompt, drives a tool-using coding agent against an isolated
//! sandbox until the agent reports a summary or the iteration bound is hit,
//! and persists exactly one outcome. Every externally visible unit of work is
//! a checkpointed step, so a retried run replays instead of redoing it.

pub mod agent;
pub mod domain;
pub mod error;
pub mod id;
pub mod llm;
pub mod network;
pub mod sandbox;
pub mod storage;
pub mod tools;
pub mod workflow;

pub use agent::{CodingAgent, ModelSettings, extract_completion_signal};
pub use domain::{IterationState, OutcomeRecord, RunRequest, RunResult, TriggerEvent};
pub use error::{Result, SandloopError};
pub use llm::{AnthropicClient, AnthropicConfig, LlmClient, MockLlmClient};
pub use network::{CodeNetwork, NetworkOutcome, NetworkStatus};
pub use sandbox::{LocalSandboxConfig, LocalSandboxService, SandboxService, SandboxSession};
pub use storage::{Database, MessageStore, StepStore};
pub use workflow::{CodeWorkflow, StepRunner, WorkflowConfig};
