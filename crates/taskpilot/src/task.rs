use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

use crate::agents::Agent;
use crate::errors::{AgentError, AgentResult};

/// An agent shared between its session and the task currently running it
pub type SharedAgent = Arc<Mutex<Box<dyn Agent>>>;

/// One in-flight [`Agent::run`], executing concurrently with whoever started it.
///
/// Awaiting the task yields the run's outcome. Cancelling the token ends the run with
/// [`AgentError::Cancelled`]; the agent itself stays with its session for cleanup.
pub struct AgentTask {
    handle: JoinHandle<AgentResult<()>>,
}

impl AgentTask {
    pub fn start<S: Into<String>>(agent: SharedAgent, prompt: S, cancel: CancellationToken) -> Self {
        let prompt = prompt.into();
        let run = async move {
            let mut agent = agent.lock().await;
            tokio::select! {
                result = agent.run(&prompt) => result,
                _ = cancel.cancelled() => Err(AgentError::Cancelled),
            }
        };
        // keep the caller's log subscriber so the agent's output reaches the same sinks
        let handle = tokio::spawn(run.with_current_subscriber());
        Self { handle }
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> AgentResult<()> {
        self.await
    }
}

impl Future for AgentTask {
    type Output = AgentResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AgentError::Cancelled),
            Err(e) => Err(AgentError::Internal(format!("agent task panicked: {}", e))),
        })
    }
}
