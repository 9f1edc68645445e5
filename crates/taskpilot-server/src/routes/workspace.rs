use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use taskpilot::{
    models::transcript::{Transcript, TranscriptUpdate},
    packager::package_workspace,
};
use tokio_util::io::ReaderStream;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// Reset the chat: empty transcript, empty prompt box
async fn clear() -> Json<TranscriptUpdate> {
    Json(TranscriptUpdate::new(Transcript::new()))
}

async fn download(State(state): State<AppState>) -> impl IntoResponse {
    let archive = match package_workspace(&state.workspace_dir, &state.archive_path).await {
        Ok(Some(archive)) => archive,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Workspace '{}' does not exist", state.workspace_dir.display()),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to package workspace: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to package workspace: {}", e),
                }),
            )
                .into_response();
        }
    };

    let file_name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace.zip".to_string());

    match tokio::fs::File::open(&archive).await {
        Ok(file) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                ),
            ],
            Body::from_stream(ReaderStream::new(file)),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to read archive: {}", e),
            }),
        )
            .into_response(),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/clear", post(clear))
        .route("/workspace/download", get(download))
        .with_state(state)
}
