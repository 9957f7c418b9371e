//! Tool execution context - scoped to a single run's sandbox

use crate::error::Result;
use crate::sandbox::{LiveSandbox, SandboxHandle, SandboxSession};
use crate::workflow::StepRunner;

/// What a tool may touch during one call.
///
/// Borrowed from the run for the length of the call and never stored.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub session: &'a SandboxSession,
    pub handle: &'a SandboxHandle,
    pub steps: &'a StepRunner,
}

impl<'a> ToolContext<'a> {
    pub fn new(session: &'a SandboxSession, handle: &'a SandboxHandle, steps: &'a StepRunner) -> Self {
        Self { session, handle, steps }
    }

    /// Reconnect to the run's sandbox; fails once it has expired.
    pub async fn sandbox(&self) -> Result<LiveSandbox> {
        self.session.resolve(self.handle).await
    }
}
