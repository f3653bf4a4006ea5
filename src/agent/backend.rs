use anyhow::Result;
use serde_json::Value;

use crate::recovery::RawAgentResult;

/// Natural-language job handed to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTask {
    pub start_url: String,
    pub instructions: String,
}

/// What one agent run produced.
#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    /// Final result, or `None` if the agent finished without one.
    pub result: Option<RawAgentResult>,
    /// Opaque execution history, when the runtime reports it.
    pub history: Option<Value>,
}

pub trait AgentRunner {
    fn name(&self) -> &str;
    /// Run the task once. An `Err` is an acquisition failure: nothing usable
    /// came back and recovery must not be attempted.
    fn run(&self, task: &AgentTask) -> Result<AgentRun>;
}
