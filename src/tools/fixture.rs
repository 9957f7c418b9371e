//! Shared setup for tool tests: a local sandbox and an in-memory step store.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::ToolContext;
use crate::sandbox::{LocalSandboxConfig, LocalSandboxService, SandboxHandle, SandboxSession};
use crate::storage::MemoryStepStore;
use crate::workflow::StepRunner;

pub(crate) struct Fixture {
    pub temp: TempDir,
    pub service: Arc<LocalSandboxService>,
    pub session: SandboxSession,
    pub handle: SandboxHandle,
    pub store: Arc<MemoryStepStore>,
    pub steps: StepRunner,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_idle_timeout(Duration::from_secs(600)).await
    }

    pub async fn with_idle_timeout(idle_timeout: Duration) -> Self {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(LocalSandboxService::new(LocalSandboxConfig {
            root_dir: temp.path().join("sandboxes"),
            idle_timeout,
            command_timeout: Duration::from_secs(10),
            ..Default::default()
        }));
        let session = SandboxSession::new(service.clone(), "default");
        let handle = session.create().await.unwrap();
        let store = Arc::new(MemoryStepStore::new());
        let steps = StepRunner::new("run-test", store.clone());

        Self {
            temp,
            service,
            session,
            handle,
            store,
            steps,
        }
    }

    pub fn ctx(&self) -> ToolContext<'_> {
        ToolContext::new(&self.session, &self.handle, &self.steps)
    }

    /// Path of a file inside the sandbox on disk
    pub fn sandbox_path(&self, relative: &str) -> std::path::PathBuf {
        self.service.sandbox_dir(&self.handle.sandbox_id).join(relative)
    }

    /// Fresh step runner for the same run, as a retried run would use
    pub fn replay_steps(&self) -> StepRunner {
        StepRunner::new("run-test", self.store.clone())
    }
}
