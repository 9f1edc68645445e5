use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{Agent, AGENT_LOG_TARGET};
use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Runs an external agent program, passing the prompt as its last argument.
///
/// Every line the program writes to stdout or stderr is re-emitted through the log
/// facility under the `agent` target, which is how it reaches the chat transcript.
pub struct CommandAgent {
    config: CommandConfig,
    child: Option<Child>,
}

impl CommandAgent {
    pub fn new(config: CommandConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    fn spawn(&self, prompt: &str) -> AgentResult<Child> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        command.spawn().map_err(|e| {
            AgentError::ExecutionError(format!("failed to start {}: {}", self.config.program, e))
        })
    }
}

async fn forward_lines<R>(reader: Option<R>, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => warn!(target: AGENT_LOG_TARGET, "{}", line),
            Ok(Some(line)) => info!(target: AGENT_LOG_TARGET, "{}", line),
            Ok(None) => break,
            Err(e) => {
                debug!("stopped reading agent output: {}", e);
                break;
            }
        }
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn name(&self) -> &str {
        &self.config.program
    }

    async fn run(&mut self, prompt: &str) -> AgentResult<()> {
        let mut child = self.spawn(prompt)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        // Kept on self so cleanup can still reach the process if this future is dropped
        let child = self.child.insert(child);

        let (_, _, status) = tokio::join!(
            forward_lines(stdout, false),
            forward_lines(stderr, true),
            child.wait()
        );
        let status = status.map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        self.child = None;

        if status.success() {
            Ok(())
        } else {
            Err(AgentError::ExecutionError(format!(
                "{} exited with {}",
                self.config.program, status
            )))
        }
    }

    async fn cleanup(&mut self) -> AgentResult<()> {
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                debug!("killing agent process {:?}", child.id());
                child
                    .kill()
                    .await
                    .map_err(|e| AgentError::Internal(format!("failed to kill agent: {}", e)))?;
            }
        }
        Ok(())
    }
}
