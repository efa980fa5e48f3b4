use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use common_http_errors::{ApiError, ApiResult};
use common_security::TenantCtxExtractor;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::app::AppState;
use crate::jobs::{JobSnapshot, TaskFrame};

pub async fn get_task(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .jobs
        .snapshot(ctx.tenant_id, task_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("task_not_found", Some(ctx.trace_id)))
}

/// Websocket that reports progress until the task finishes, then sends the
/// final snapshot and closes.
pub async fn task_socket(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(task_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let frames = state
        .jobs
        .progress_frames(ctx.tenant_id, task_id, state.task_poll_interval)
        .await
        .ok_or_else(|| ApiError::not_found("task_not_found", Some(ctx.trace_id)))?;
    Ok(ws.on_upgrade(move |socket| forward_frames(socket, frames, task_id)).into_response())
}

async fn forward_frames(mut socket: WebSocket, mut frames: mpsc::Receiver<TaskFrame>, task_id: Uuid) {
    while let Some(frame) = frames.recv().await {
        if socket.send(Message::Text(frame.to_text())).await.is_err() {
            debug!(%task_id, "task socket closed by client");
            return;
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}
