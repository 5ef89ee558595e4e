//! Chat session endpoints.
//!
//! Sending a message streams NDJSON (one `ChatStreamEvent` per line). The
//! stream starts with a `userTurn` event and ends with `done` or `error`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use omnitool_ai::{ChatSessionSnapshot, ChatStreamEvent};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub message: String,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<ChatSessionSnapshot>)> {
    let snapshot = state.chat_sessions.create()?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Reads never wait on a streaming reply; they return the last settled view.
async fn get_session(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ChatSessionSnapshot>> {
    Ok(Json(state.chat_sessions.snapshot(&id)?))
}

async fn delete_session(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state.chat_sessions.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_session(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ChatSessionSnapshot>> {
    Ok(Json(state.chat_sessions.reset(&id)?))
}

/// POST /api/v1/chat/sessions/{id}/messages
///
/// The session stays locked until the backend stream settles, even if the
/// client disconnects early. A concurrent send gets 409.
async fn send_message(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendMessageBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload?;
    let message = body.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }

    let mut session = state.chat_sessions.acquire(&id)?;
    let (tx, rx) = mpsc::channel::<ChatStreamEvent>(100);

    tokio::spawn(async move {
        let result = session.send_with_events(&message, &tx).await;
        // Publish the settled session before the stream closes.
        drop(session);
        drop(tx);
        if let Err(e) = result {
            tracing::warn!("Chat send on session {} failed: {}", id, e);
        }
    });

    let ndjson_stream = ReceiverStream::new(rx).map(|event| {
        let mut json = serde_json::to_string(&event).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","sessionId":"","code":"INTERNAL_ERROR","message":"{}"}}"#,
                e
            )
        });
        json.push('\n');
        Ok::<_, std::convert::Infallible>(json)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ndjson_stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/sessions", post(create_session))
        .route(
            "/chat/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/chat/sessions/{id}/reset", post(reset_session))
        .route("/chat/sessions/{id}/messages", post(send_message))
}
