//! Error types for Sandloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Sandloop
#[derive(Debug, Error)]
pub enum SandloopError {
    /// The sandbox service could not allocate an environment
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// The sandbox outlived its idle window
    #[error("Sandbox expired: {sandbox_id} (idle for {idle_ms}ms)")]
    ExpiredSandbox { sandbox_id: String, idle_ms: u64 },

    /// The sandbox id is unknown to the service
    #[error("Sandbox not found: {0}")]
    SandboxNotFound(String),

    /// A command or file operation inside the sandbox failed
    #[error("Tool error: {0}")]
    ToolExecution(String),

    /// Tool input from the model was malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A checkpointed step failed
    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl SandloopError {
    /// Whether this error ends the run instead of being fed back to the agent.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SandloopError::ToolExecution(_) | SandloopError::InvalidInput(_))
    }

    /// Whether this error ends the run for good.
    ///
    /// Other fatal errors only interrupt the run; replaying it under the same
    /// id resumes from its checkpoints.
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            SandloopError::Provisioning(_) | SandloopError::ExpiredSandbox { .. } | SandloopError::SandboxNotFound(_)
        )
    }
}

/// Result type alias for Sandloop operations
pub type Result<T> = std::result::Result<T, SandloopError>;
