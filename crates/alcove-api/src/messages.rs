use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::error;

use alcove_types::api::SendMessageRequest;

use crate::auth::AppState;
use crate::conversation;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// Preview listing: the most recent message from each correspondent,
/// truncated for display.
pub async fn get_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let reader_id = user.id;

    // Run blocking DB work off the async runtime
    let entries = tokio::task::spawn_blocking(move || conversation::previews(&db.db, reader_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!(e))
        })??;

    Ok(Json(entries))
}

/// Full transcript between the authenticated user and `friend_id`.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(friend_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let reader_id = user.id;

    let thread =
        tokio::task::spawn_blocking(move || conversation::transcript(&db.db, reader_id, friend_id))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!(e))
            })??;

    Ok(Json(thread))
}

/// Store a new message and answer with the refreshed transcript, saving the
/// client a second round-trip to redraw the conversation.
pub async fn send_message(
    State(state): State<AppState>,
    Path(friend_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let sender_id = user.id;

    // Naive local clock, rendered back to clients without zone conversion.
    let time_sent = chrono::Local::now().naive_local();

    let thread = tokio::task::spawn_blocking(move || {
        db.db.create_message(sender_id, friend_id, &req.content, time_sent)?;
        conversation::transcript(&db.db, sender_id, friend_id)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!(e))
    })??;

    Ok(Json(thread))
}

pub async fn receive_file() -> Result<(), ApiError> {
    Err(ApiError::NotYetImplemented)
}

pub async fn send_file() -> Result<(), ApiError> {
    Err(ApiError::NotYetImplemented)
}
