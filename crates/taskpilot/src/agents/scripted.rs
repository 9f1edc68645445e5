use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use super::{Agent, AgentFactory, AGENT_LOG_TARGET};
use crate::errors::{AgentError, AgentResult};

/// An agent that replays a fixed script, for exercising the front-end without a real agent
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    lines: Vec<String>,
    files: Vec<(PathBuf, Vec<u8>)>,
    failure: Option<AgentError>,
    hang: bool,
    runs: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

impl ScriptedAgent {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Write `content` to `path` once all lines have been emitted
    pub fn with_file<P: Into<PathBuf>, C: Into<Vec<u8>>>(mut self, path: P, content: C) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Fail with `error` after emitting the script
    pub fn with_failure(mut self, error: AgentError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Never finish on its own after emitting the script
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&mut self, _prompt: &str) -> AgentResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        for line in &self.lines {
            info!(target: AGENT_LOG_TARGET, "{}", line);
            tokio::task::yield_now().await;
        }
        for (path, content) in &self.files {
            tokio::fs::write(path, content)
                .await
                .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        }
        if self.hang {
            futures::future::pending::<()>().await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn cleanup(&mut self) -> AgentResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out clones of a [`ScriptedAgent`]; the clones share its counters
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    template: ScriptedAgent,
    created: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(template: ScriptedAgent) -> Self {
        Self {
            template,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentFactory for ScriptedFactory {
    async fn create(&self) -> AgentResult<Box<dyn Agent>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.clone()))
    }
}
