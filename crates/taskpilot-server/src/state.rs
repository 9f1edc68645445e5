use std::path::PathBuf;
use std::sync::Arc;

use taskpilot::agents::AgentFactory;
use taskpilot::bridge::SinkRegistry;
use taskpilot::orchestrator::StreamOrchestrator;
use taskpilot::session::AgentSession;
use tokio::sync::Mutex;

use crate::configuration::WorkspaceSettings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<StreamOrchestrator>,
    /// One request at a time; a busy session rejects new requests
    pub session: Arc<Mutex<AgentSession>>,
    pub workspace_dir: PathBuf,
    pub archive_path: PathBuf,
}

impl AppState {
    pub fn new(
        workspace: &WorkspaceSettings,
        factory: Arc<dyn AgentFactory>,
        registry: SinkRegistry,
    ) -> Self {
        Self {
            orchestrator: Arc::new(StreamOrchestrator::new(workspace.dir.clone(), registry)),
            session: Arc::new(Mutex::new(AgentSession::new(factory))),
            workspace_dir: workspace.dir.clone(),
            archive_path: workspace.archive_path.clone(),
        }
    }
}
