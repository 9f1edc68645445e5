use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Agent creation failed: {0}")]
    CreationFailed(String),

    #[error("Agent execution failed: {0}")]
    ExecutionError(String),

    #[error("Agent task was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failure of a single streamed request
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Failed to read workspace file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestratorError::Agent(AgentError::Cancelled))
    }
}
