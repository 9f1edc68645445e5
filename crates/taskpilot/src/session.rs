use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::agents::AgentFactory;
use crate::errors::AgentResult;
use crate::task::SharedAgent;

/// Owns the agent used by one request at a time.
///
/// The agent is created lazily on first use and torn down by [`AgentSession::release`],
/// so every request starts from a fresh instance.
pub struct AgentSession {
    factory: Arc<dyn AgentFactory>,
    agent: Option<SharedAgent>,
}

impl AgentSession {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            agent: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.agent.is_some()
    }

    /// Get the current agent, creating it first if there is none
    pub async fn ensure_agent(&mut self) -> AgentResult<SharedAgent> {
        if let Some(agent) = &self.agent {
            return Ok(agent.clone());
        }
        let agent = self.factory.create().await?;
        info!("created agent {}", agent.name());
        let agent = Arc::new(Mutex::new(agent));
        self.agent = Some(agent.clone());
        Ok(agent)
    }

    /// Clean up and drop the current agent. A no-op when there is none.
    pub async fn release(&mut self) -> AgentResult<()> {
        let Some(agent) = self.agent.take() else {
            return Ok(());
        };
        let mut agent = agent.lock().await;
        debug!("cleaning up agent {}", agent.name());
        agent.cleanup().await
    }
}
