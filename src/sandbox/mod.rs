//! Sandbox boundary - one isolated execution environment per run
//!
//! The [`SandboxService`] trait is the narrow interface to whatever actually
//! runs commands. [`SandboxSession`] layers the per-run contract on top:
//! create once, resolve before every use, and expose the preview endpoint.

mod local;

pub use local::{LocalSandboxConfig, LocalSandboxService};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Template used when the caller doesn't name one
pub const DEFAULT_TEMPLATE_ID: &str = "default";

/// Port the preview server listens on inside the sandbox
pub const DEFAULT_PREVIEW_PORT: u16 = 3000;

/// Durable reference to a sandbox, safe to checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub sandbox_id: String,
    pub template_id: String,
}

/// A sandbox that was resumed and is usable until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSandbox {
    pub sandbox_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Isolated execution service.
///
/// `resume_sandbox` must fail with `SandloopError::ExpiredSandbox` once the
/// idle window has passed.
#[async_trait]
pub trait SandboxService: Send + Sync {
    /// Allocate a new sandbox from a template.
    async fn create_sandbox(&self, template_id: &str) -> Result<SandboxHandle>;

    /// Reconnect to an existing sandbox, refreshing its idle window.
    async fn resume_sandbox(&self, sandbox_id: &str) -> Result<LiveSandbox>;

    /// Run a shell command, forwarding output as it arrives.
    ///
    /// A non-zero exit is an `Ok` result; `Err` means the command could not
    /// run to completion (spawn failure, timeout).
    async fn exec_command(
        &self,
        sandbox: &LiveSandbox,
        command: &str,
        on_stdout: &mut (dyn for<'a> FnMut(&'a str) + Send),
        on_stderr: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<CommandResult>;

    async fn write_file(&self, sandbox: &LiveSandbox, path: &str, content: &str) -> Result<()>;

    async fn read_file(&self, sandbox: &LiveSandbox, path: &str) -> Result<String>;

    /// Host name under which `port` is reachable from outside.
    fn external_host(&self, sandbox: &LiveSandbox, port: u16) -> String;
}

/// Per-run view of the sandbox service.
#[derive(Clone)]
pub struct SandboxSession {
    service: Arc<dyn SandboxService>,
    template_id: String,
}

impl std::fmt::Debug for SandboxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxSession")
            .field("template_id", &self.template_id)
            .finish_non_exhaustive()
    }
}

impl SandboxSession {
    pub fn new(service: Arc<dyn SandboxService>, template_id: impl Into<String>) -> Self {
        Self {
            service,
            template_id: template_id.into(),
        }
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn service(&self) -> &dyn SandboxService {
        self.service.as_ref()
    }

    /// Provision the run's sandbox.
    pub async fn create(&self) -> Result<SandboxHandle> {
        let handle = self.service.create_sandbox(&self.template_id).await?;
        log::info!(
            "Provisioned sandbox {} from template {}",
            handle.sandbox_id,
            handle.template_id
        );
        Ok(handle)
    }

    /// Reconnect to the run's sandbox before using it.
    pub async fn resolve(&self, handle: &SandboxHandle) -> Result<LiveSandbox> {
        self.service.resume_sandbox(&handle.sandbox_id).await
    }

    /// Externally reachable URL for `port`.
    pub fn endpoint(&self, sandbox: &LiveSandbox, port: u16) -> String {
        format!("https://{}", self.service.external_host(sandbox, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandloopError;
    use std::time::Duration;
    use tempfile::TempDir;

    fn session(temp: &TempDir) -> SandboxSession {
        let config = LocalSandboxConfig {
            root_dir: temp.path().join("sandboxes"),
            ..Default::default()
        };
        SandboxSession::new(Arc::new(LocalSandboxService::new(config)), DEFAULT_TEMPLATE_ID)
    }

    #[tokio::test]
    async fn test_create_resolve_endpoint() {
        let temp = TempDir::new().unwrap();
        let session = session(&temp);

        let handle = session.create().await.unwrap();
        assert_eq!(handle.template_id, DEFAULT_TEMPLATE_ID);

        let live = session.resolve(&handle).await.unwrap();
        assert_eq!(live.sandbox_id, handle.sandbox_id);

        let url = session.endpoint(&live, DEFAULT_PREVIEW_PORT);
        assert_eq!(url, format!("https://3000-{}.sandbox.local", handle.sandbox_id));
    }

    #[tokio::test]
    async fn test_resolve_after_idle_window_fails() {
        let temp = TempDir::new().unwrap();
        let config = LocalSandboxConfig {
            root_dir: temp.path().join("sandboxes"),
            idle_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let session = SandboxSession::new(Arc::new(LocalSandboxService::new(config)), "default");

        let handle = session.create().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let err = session.resolve(&handle).await.unwrap_err();
        assert!(matches!(err, SandloopError::ExpiredSandbox { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_command_result_success() {
        assert!(CommandResult::default().success());
        let failed = CommandResult {
            exit_code: 2,
            ..Default::default()
        };
        assert!(!failed.success());
    }
}
