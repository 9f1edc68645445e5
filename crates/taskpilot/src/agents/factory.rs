use async_trait::async_trait;
use serde::Deserialize;

use super::command::{CommandAgent, CommandConfig};
use super::echo::EchoAgent;
use super::{Agent, AgentFactory};
use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum AgentConfig {
    Echo,
    Command(CommandConfig),
}

/// Builds agents from an [`AgentConfig`]
#[derive(Debug, Clone)]
pub struct ConfiguredFactory {
    config: AgentConfig,
}

impl ConfiguredFactory {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }
}

pub fn get_agent(config: &AgentConfig) -> AgentResult<Box<dyn Agent>> {
    match config {
        AgentConfig::Echo => Ok(Box::new(EchoAgent::new())),
        AgentConfig::Command(command) => {
            if command.program.trim().is_empty() {
                return Err(AgentError::CreationFailed(
                    "command agent needs a program".to_string(),
                ));
            }
            Ok(Box::new(CommandAgent::new(command.clone())))
        }
    }
}

#[async_trait]
impl AgentFactory for ConfiguredFactory {
    async fn create(&self) -> AgentResult<Box<dyn Agent>> {
        get_agent(&self.config)
    }
}
