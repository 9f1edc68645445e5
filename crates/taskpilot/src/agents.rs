//! The contract between the chat front-end and the external agent that does the work.
//!
//! An agent reports progress only through the log facility (`tracing`, conventionally
//! under the `agent` target); [`Agent::run`] returns nothing but success or failure.
use async_trait::async_trait;

use crate::errors::AgentResult;

pub mod command;
pub mod echo;
pub mod factory;
pub mod scripted;

/// Log target agents emit their progress under
pub const AGENT_LOG_TARGET: &str = "agent";

/// A ready-to-use agent instance
#[async_trait]
pub trait Agent: Send {
    /// Get the name of the agent
    fn name(&self) -> &str;

    /// Work on the prompt until done, emitting progress through the log facility
    async fn run(&mut self, prompt: &str) -> AgentResult<()>;

    /// Release anything the agent still holds
    async fn cleanup(&mut self) -> AgentResult<()>;
}

/// Produces fresh agent instances on demand
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create(&self) -> AgentResult<Box<dyn Agent>>;
}
