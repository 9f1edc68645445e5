//! Lifecycle of one chat request.
//!
//! The user's prompt goes to the agent while the agent's log output is streamed back
//! as assistant messages. Once the agent finishes, anything still buffered is drained,
//! and files the agent created in the workspace are echoed into the transcript.
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bridge::{LogBridge, SinkRegistry};
use crate::errors::OrchestratorError;
use crate::models::message::Message;
use crate::models::transcript::{Transcript, TranscriptUpdate};
use crate::session::AgentSession;
use crate::task::AgentTask;
use crate::workspace::{ArtifactKind, WorkspaceSnapshot};

pub struct StreamOrchestrator {
    workspace_dir: PathBuf,
    registry: SinkRegistry,
}

/// Appends to the transcript and publishes a snapshot after every message
struct Emitter<'a> {
    transcript: Transcript,
    updates: &'a mpsc::Sender<TranscriptUpdate>,
    cancel: &'a CancellationToken,
}

impl Emitter<'_> {
    async fn emit(&mut self, message: Message) {
        self.transcript.push(message);
        let update = TranscriptUpdate::new(self.transcript.clone());
        if self.updates.send(update).await.is_err() && !self.cancel.is_cancelled() {
            debug!("update receiver dropped, cancelling request");
            self.cancel.cancel();
        }
    }

    /// Whitespace-only lines never become bubbles
    async fn emit_line(&mut self, line: String) {
        if !line.trim().is_empty() {
            self.emit(Message::assistant(line)).await;
        }
    }
}

impl StreamOrchestrator {
    pub fn new<P: Into<PathBuf>>(workspace_dir: P, registry: SinkRegistry) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            registry,
        }
    }

    /// Run one request to completion, sending a [`TranscriptUpdate`] for every message
    /// appended to `history`.
    ///
    /// The log bridge is detached and the session's agent released on every path,
    /// including failure and cancellation. A failed request leaves the client with the
    /// last update it received.
    pub async fn run(
        &self,
        session: &mut AgentSession,
        prompt: &str,
        history: Transcript,
        updates: &mpsc::Sender<TranscriptUpdate>,
        cancel: CancellationToken,
    ) -> Result<Transcript, OrchestratorError> {
        let mut bridge = LogBridge::new();
        let result = self
            .stream(session, &mut bridge, prompt, history, updates, &cancel)
            .await;

        bridge.detach();
        let released = session.release().await;
        match (result, released) {
            (Ok(transcript), Ok(())) => Ok(transcript),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), released) => {
                if let Err(cleanup_err) = released {
                    warn!("agent cleanup failed after {}: {}", e, cleanup_err);
                }
                Err(e)
            }
        }
    }

    async fn stream(
        &self,
        session: &mut AgentSession,
        bridge: &mut LogBridge,
        prompt: &str,
        history: Transcript,
        updates: &mpsc::Sender<TranscriptUpdate>,
        cancel: &CancellationToken,
    ) -> Result<Transcript, OrchestratorError> {
        let agent = session.ensure_agent().await?;
        let before = self.snapshot().await?;

        bridge.attach(&self.registry);
        let mut emitter = Emitter {
            transcript: history,
            updates,
            cancel,
        };
        emitter.emit(Message::user(prompt)).await;

        let mut task = AgentTask::start(agent, prompt, cancel.clone());
        let outcome = loop {
            tokio::select! {
                biased;
                Some(line) = bridge.next_line() => emitter.emit_line(line).await,
                result = &mut task => break result,
            }
        };

        // lines logged right before completion are still buffered
        while let Some(line) = bridge.try_next_line() {
            emitter.emit_line(line).await;
        }
        bridge.detach();
        outcome?;

        let after = self.snapshot().await?;
        for name in before.new_entries(&after) {
            let Some(kind) = ArtifactKind::from_file_name(name) else {
                continue;
            };
            let path = self.workspace_dir.join(name);
            if !tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                continue;
            }
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| OrchestratorError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
            emitter.emit(Message::assistant(kind.render(&content))).await;
        }

        Ok(emitter.transcript)
    }

    async fn snapshot(&self) -> Result<WorkspaceSnapshot, OrchestratorError> {
        WorkspaceSnapshot::capture(&self.workspace_dir)
            .await
            .map_err(|source| OrchestratorError::Io {
                path: self.workspace_dir.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::scripted::{ScriptedAgent, ScriptedFactory};
    use crate::bridge::BridgeLayer;
    use crate::errors::AgentError;
    use crate::models::message::Role;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{EnvFilter, Layer};

    fn install_bridge_layer(registry: &SinkRegistry) -> tracing::subscriber::DefaultGuard {
        let layer = BridgeLayer::new(registry.clone()).with_filter(EnvFilter::new("agent=trace"));
        tracing::subscriber::set_default(tracing_subscriber::registry().with(layer))
    }

    fn contents(transcript: &Transcript) -> Vec<&str> {
        transcript
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_logs_become_assistant_messages() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new(["thinking...", "", "   ", "done"]);
        let mut session = AgentSession::new(Arc::new(ScriptedFactory::new(agent.clone())));
        let orchestrator = StreamOrchestrator::new(dir.path(), registry.clone());
        let (tx, mut rx) = mpsc::channel(100);

        let transcript = orchestrator
            .run(&mut session, "plan a trip", Transcript::new(), &tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(contents(&transcript), vec!["plan a trip", "thinking...", "done"]);
        assert_eq!(transcript.messages()[0].role, Role::User);
        assert!(transcript.messages()[1..]
            .iter()
            .all(|m| m.role == Role::Assistant));

        // one update per appended message, each a growing prefix
        let mut sizes = Vec::new();
        while let Ok(update) = rx.try_recv() {
            assert!(update.prompt.is_empty());
            sizes.push(update.messages.len());
        }
        assert_eq!(sizes, vec![1, 2, 3]);

        assert_eq!(agent.cleanup_count(), 1);
        assert!(!session.is_initialized());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_user_message_comes_first_after_history() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        let mut session = AgentSession::new(Arc::new(ScriptedFactory::new(ScriptedAgent::new([
            "step",
        ]))));
        let orchestrator = StreamOrchestrator::new(dir.path(), registry);
        let (tx, mut rx) = mpsc::channel(100);
        let history = Transcript::from(vec![Message::user("earlier"), Message::assistant("reply")]);

        orchestrator
            .run(&mut session, "again", history, &tx, CancellationToken::new())
            .await
            .unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(contents(&first.messages), vec!["earlier", "reply", "again"]);
        assert_eq!(first.messages.messages()[2].role, Role::User);
    }

    #[tokio::test]
    async fn test_only_new_recognized_files_are_echoed() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "old").unwrap();

        let agent = ScriptedAgent::new(["writing files"])
            .with_file(dir.path().join("a.md"), "rewritten")
            .with_file(dir.path().join("b.md"), "# Findings")
            .with_file(dir.path().join("c.log"), "noise")
            .with_file(dir.path().join("d.txt"), "plain notes");
        let mut session = AgentSession::new(Arc::new(ScriptedFactory::new(agent)));
        let orchestrator = StreamOrchestrator::new(dir.path(), registry);
        let (tx, _rx) = mpsc::channel(100);

        let transcript = orchestrator
            .run(&mut session, "research", Transcript::new(), &tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            contents(&transcript),
            vec![
                "research",
                "writing files",
                "### 📄 Markdown File Created:\n\n# Findings",
                "📝 Text File Created:\n\n```\nplain notes\n```",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_workspace_reports_no_files() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        let mut session =
            AgentSession::new(Arc::new(ScriptedFactory::new(ScriptedAgent::new(["ok"]))));
        let orchestrator = StreamOrchestrator::new(dir.path().join("workspace"), registry);
        let (tx, _rx) = mpsc::channel(100);

        let transcript = orchestrator
            .run(&mut session, "hi", Transcript::new(), &tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(contents(&transcript), vec!["hi", "ok"]);
    }

    #[tokio::test]
    async fn test_agent_failure_still_cleans_up_and_keeps_logs() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new(["partial progress"])
            .with_failure(AgentError::ExecutionError("browser crashed".to_string()));
        let factory = ScriptedFactory::new(agent.clone());
        let mut session = AgentSession::new(Arc::new(factory.clone()));
        let orchestrator = StreamOrchestrator::new(dir.path(), registry.clone());
        let (tx, mut rx) = mpsc::channel(100);

        let err = orchestrator
            .run(&mut session, "go", Transcript::new(), &tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::Agent(AgentError::ExecutionError(_))
        ));
        assert_eq!(agent.cleanup_count(), 1);
        assert!(!session.is_initialized());
        assert!(registry.is_empty());

        let mut last = None;
        while let Ok(update) = rx.try_recv() {
            last = Some(update);
        }
        assert_eq!(
            contents(&last.unwrap().messages),
            vec!["go", "partial progress"]
        );

        // the next request gets a fresh agent
        let _ = orchestrator
            .run(&mut session, "retry", Transcript::new(), &tx, CancellationToken::new())
            .await;
        assert_eq!(factory.created_count(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_releases_everything() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new(["started"]).hanging();
        let mut session = AgentSession::new(Arc::new(ScriptedFactory::new(agent.clone())));
        let orchestrator = StreamOrchestrator::new(dir.path(), registry.clone());
        let (tx, mut rx) = mpsc::channel(100);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            // user message, then the first log line
            rx.recv().await;
            rx.recv().await;
            canceller.cancel();
        });

        let err = orchestrator
            .run(&mut session, "forever", Transcript::new(), &tx, cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(agent.cleanup_count(), 1);
        assert!(!session.is_initialized());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels_the_agent() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new(["started"]).hanging();
        let mut session = AgentSession::new(Arc::new(ScriptedFactory::new(agent.clone())));
        let orchestrator = StreamOrchestrator::new(dir.path(), registry);
        let (tx, rx) = mpsc::channel(100);
        drop(rx);

        let err = orchestrator
            .run(&mut session, "anyone there?", Transcript::new(), &tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(agent.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_artifact_aborts_remaining_steps() {
        let registry = SinkRegistry::new();
        let _guard = install_bridge_layer(&registry);
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new(["writing"])
            .with_file(dir.path().join("a.md"), "fine")
            .with_file(dir.path().join("b.txt"), [0xff, 0xfe, 0xfd])
            .with_file(dir.path().join("c.md"), "never shown");
        let mut session = AgentSession::new(Arc::new(ScriptedFactory::new(agent.clone())));
        let orchestrator = StreamOrchestrator::new(dir.path(), registry);
        let (tx, mut rx) = mpsc::channel(100);

        let err = orchestrator
            .run(&mut session, "go", Transcript::new(), &tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Io { ref path, .. } if path.ends_with("b.txt")));
        assert_eq!(agent.cleanup_count(), 1);

        let mut last = None;
        while let Ok(update) = rx.try_recv() {
            last = Some(update);
        }
        assert_eq!(
            contents(&last.unwrap().messages),
            vec!["go", "writing", "### 📄 Markdown File Created:\n\nfine"]
        );
    }
}
