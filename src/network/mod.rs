//! Orchestration loop - drives the coding agent until it finishes or runs out of iterations.
//!
//! State machine:
//! - `Running`: the router is consulted before every invocation
//! - `Complete`: the summary is set; terminal
//! - `Exhausted`: the iteration bound was hit without a summary; terminal
//!
//! Exhaustion is a normal outcome with a blank summary, not an error.

use crate::agent::CodingAgent;
use crate::domain::IterationState;
use crate::error::Result;
use crate::llm::{LlmClient, Message, Usage};
use crate::tools::ToolContext;

/// Iteration bound used when none is configured
pub const DEFAULT_MAX_ITERATIONS: u32 = 15;

/// Hard ceiling on any configured bound
pub const MAX_ITERATIONS_CEILING: u32 = 50;

/// Where the loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Running,
    Complete,
    Exhausted,
}

impl NetworkStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NetworkStatus::Running)
    }
}

/// Final state of a network run.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkOutcome {
    pub status: NetworkStatus,
    /// Agent invocations performed
    pub iterations: u32,
    pub state: IterationState,
    pub usage: Usage,
}

/// Bounded loop around a single coding agent.
pub struct CodeNetwork<L: LlmClient> {
    agent: CodingAgent<L>,
    max_iterations: u32,
}

/// Clamp a configured bound into `1..=MAX_ITERATIONS_CEILING`
pub fn clamp_iterations(max_iterations: u32) -> u32 {
    max_iterations.clamp(1, MAX_ITERATIONS_CEILING)
}

impl<L: LlmClient> CodeNetwork<L> {
    pub fn new(agent: CodingAgent<L>, max_iterations: u32) -> Self {
        Self {
            agent,
            max_iterations: clamp_iterations(max_iterations),
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn agent(&self) -> &CodingAgent<L> {
        &self.agent
    }

    /// Router: the next agent to invoke, or `None` once the run is done.
    fn route(&self, state: &IterationState) -> Option<&CodingAgent<L>> {
        if state.is_complete() { None } else { Some(&self.agent) }
    }

    /// Drive the agent from a fresh state.
    ///
    /// `conversation` is the opening history, ending with the user prompt.
    /// Errors out of an invocation (provisioning, expiry, model failures)
    /// end the run and are returned as-is.
    pub async fn run(&self, conversation: Vec<Message>, ctx: &ToolContext<'_>) -> Result<NetworkOutcome> {
        let mut conversation = conversation;
        let mut state = IterationState::new();
        let mut iterations = 0;
        let mut usage = Usage::default();

        let status = loop {
            let Some(agent) = self.route(&state) else {
                break NetworkStatus::Complete;
            };
            if iterations >= self.max_iterations {
                break NetworkStatus::Exhausted;
            }

            iterations += 1;
            log::debug!(
                "[{}] {} iteration {}/{}",
                ctx.steps.run_id(),
                agent.name(),
                iterations,
                self.max_iterations
            );

            let turn = agent.run_iteration(&mut conversation, ctx, &mut state).await?;
            usage.add(&turn.response.usage);
        };

        match status {
            NetworkStatus::Complete => log::info!(
                "[{}] Completed after {} iteration(s)",
                ctx.steps.run_id(),
                iterations
            ),
            _ => log::warn!(
                "[{}] Exhausted {} iterations without a summary",
                ctx.steps.run_id(),
                iterations
            ),
        }

        Ok(NetworkOutcome {
            status,
            iterations,
            state,
            usage,
        })
    }
}
