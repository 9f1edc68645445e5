use async_trait::async_trait;
use tracing::info;

use super::{Agent, AGENT_LOG_TARGET};
use crate::errors::AgentResult;

/// Agent that narrates the prompt back; handy for smoke-testing the front-end
#[derive(Debug, Clone, Default)]
pub struct EchoAgent;

impl EchoAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&mut self, prompt: &str) -> AgentResult<()> {
        info!(target: AGENT_LOG_TARGET, "Received task: {}", prompt);
        for (i, line) in prompt.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            info!(target: AGENT_LOG_TARGET, "Step {}: {}", i + 1, line.trim());
            tokio::task::yield_now().await;
        }
        info!(target: AGENT_LOG_TARGET, "Task complete");
        Ok(())
    }

    async fn cleanup(&mut self) -> AgentResult<()> {
        Ok(())
    }
}
