mod configuration;
mod error;
mod logging;
mod routes;
mod state;

use std::sync::Arc;

use taskpilot::agents::factory::ConfiguredFactory;
use taskpilot::bridge::SinkRegistry;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = configuration::Settings::new()?;

    // Every log line passes through this registry on its way into chat transcripts
    let registry = SinkRegistry::new();
    logging::init(&settings.logging, &registry)?;

    let factory = Arc::new(ConfiguredFactory::new(settings.agent));
    let state = state::AppState::new(&settings.workspace, factory, registry);
    info!(
        "serving workspace {} (archive at {})",
        state.workspace_dir.display(),
        state.archive_path.display()
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
