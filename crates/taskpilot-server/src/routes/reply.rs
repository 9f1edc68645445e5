use crate::state::AppState;
use axum::{
    extract::State,
    http::{self, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use taskpilot::{
    errors::OrchestratorError,
    models::message::Message,
    models::transcript::{Transcript, TranscriptUpdate},
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    prompt: String,
    #[serde(default)]
    history: Vec<Message>,
}

// Streaming response, one protocol frame per line
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

// Protocol-specific message formatting
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn format_update(update: &TranscriptUpdate) -> String {
        // Transcript snapshots start with "0:"
        let encoded = serde_json::to_string(update).unwrap_or_else(|_| "{}".to_string());
        format!("0:{}\n", encoded)
    }

    fn format_error(message: &str) -> String {
        // Errors start with "3:"
        let encoded = serde_json::to_string(message).unwrap_or_else(|_| String::new());
        format!("3:{}\n", encoded)
    }

    fn format_finish(reason: &str) -> String {
        // Finish messages start with "d:"
        let finish = json!({ "finishReason": reason });
        format!("d:{}\n", finish)
    }
}

/// Forward transcript updates to the client until the request ends or the client goes away
async fn forward_updates(
    mut updates: mpsc::Receiver<TranscriptUpdate>,
    tx: &mpsc::Sender<String>,
    cancel: &CancellationToken,
) {
    loop {
        match timeout(Duration::from_millis(500), updates.recv()).await {
            Ok(Some(update)) => {
                if let Err(e) = tx.send(ProtocolFormatter::format_update(&update)).await {
                    tracing::error!("Error sending update through channel: {}", e);
                    cancel.cancel();
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => {
                // Heartbeat, used to detect disconnected clients and then stop the agent
                if tx.is_closed() {
                    tracing::info!("client disconnected, cancelling request");
                    cancel.cancel();
                    break;
                }
            }
        }
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> Result<SseResponse, StatusCode> {
    if request.prompt.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Only one request may drive the agent at a time
    let mut session = state.session.clone().try_lock_owned().map_err(|_| {
        tracing::warn!("rejecting request, agent is busy");
        StatusCode::CONFLICT
    })?;

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let orchestrator = state.orchestrator.clone();
    let cancel = CancellationToken::new();
    let ReplyRequest { prompt, history } = request;

    let request_task = async move {
        let (update_tx, update_rx) = mpsc::channel(100);
        let run_cancel = cancel.clone();
        let run = async move {
            // dropping the sender at the end lets the forwarder finish
            let updates = update_tx;
            orchestrator
                .run(
                    &mut session,
                    &prompt,
                    Transcript::from(history),
                    &updates,
                    run_cancel,
                )
                .await
        };

        let (result, _) = tokio::join!(run, forward_updates(update_rx, &tx, &cancel));

        let reason = match result {
            Ok(_) => "stop",
            Err(e) if e.is_cancelled() => "cancelled",
            Err(e) => {
                tracing::error!("Request failed: {}", e);
                let _ = tx.send(ProtocolFormatter::format_error(&describe(&e))).await;
                "error"
            }
        };
        let _ = tx.send(ProtocolFormatter::format_finish(reason)).await;
    };
    tokio::spawn(request_task.with_current_subscriber());

    Ok(SseResponse::new(stream))
}

fn describe(error: &OrchestratorError) -> String {
    match error {
        OrchestratorError::Agent(e) => e.to_string(),
        OrchestratorError::Io { .. } => format!("Could not show workspace output: {}", error),
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reply", post(handler))
        .with_state(state)
}
