use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use herald_shared::validation::{validate_message_content, validate_snowflake};
use std::sync::Arc;

use crate::db;
use crate::error::AppError;
use crate::models::{
    ApiClient, ApiResponse, CreateMessageRequest, MessageQuery, ScheduledMessage,
    UpdateMessageRequest,
};
use crate::AppState;

const SENT_MESSAGE_IMMUTABLE: &str = "Cannot modify a message that has already been sent";

/// Parses any RFC 3339 instant and re-renders it in the stored form.
fn parse_scheduled_for(raw: &str) -> Result<String, AppError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| db::timestamp(dt.with_timezone(&Utc)))
        .map_err(|_| AppError::Validation(format!("Invalid scheduledFor date: {}", raw)))
}

async fn load(state: &AppState, id: &str) -> Result<ScheduledMessage, AppError> {
    db::messages::find_one(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Message"))
}

/// POST /api/messages
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    client: ApiClient,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;

    validate_message_content(&body.content).map_err(AppError::Validation)?;
    let scheduled_for = parse_scheduled_for(&body.scheduled_for)?;
    let channel_id = body
        .channel_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| state.config.default_channel_id.clone())
        .ok_or_else(|| AppError::Validation("Channel ID is required".into()))?;
    let channel_id = channel_id.trim();
    validate_snowflake("Channel", channel_id).map_err(AppError::Validation)?;

    let message =
        db::messages::create(&state.db, body.content.trim(), channel_id, &scheduled_for).await?;
    tracing::info!(
        message_id = %message.id,
        channel_id,
        scheduled_for = %message.scheduled_for,
        ip = ?client.ip,
        "Message scheduled"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}

/// GET /api/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    query: Result<Query<MessageQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ScheduledMessage>>>, AppError> {
    let Query(query) = query?;
    let messages = db::messages::find(&state.db, query.sent).await?;
    Ok(Json(ApiResponse::list(messages)))
}

/// GET /api/messages/:id
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScheduledMessage>>, AppError> {
    let message = load(&state, &id).await?;
    Ok(Json(ApiResponse::success(message)))
}

/// PATCH /api/messages/:id
pub async fn update_message(
    State(state): State<Arc<AppState>>,
    client: ApiClient,
    Path(id): Path<String>,
    body: Result<Json<UpdateMessageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ScheduledMessage>>, AppError> {
    let Json(body) = body?;
    let mut message = load(&state, &id).await?;
    if message.sent {
        return Err(AppError::Validation(SENT_MESSAGE_IMMUTABLE.into()));
    }

    if let Some(content) = body.content {
        validate_message_content(&content).map_err(AppError::Validation)?;
        message.content = content.trim().to_string();
    }
    if let Some(raw) = body.scheduled_for {
        message.scheduled_for = parse_scheduled_for(&raw)?;
    }
    if let Some(channel_id) = body.channel_id {
        let channel_id = channel_id.trim();
        validate_snowflake("Channel", channel_id).map_err(AppError::Validation)?;
        message.channel_id = channel_id.to_string();
    }

    // The dispatcher may have delivered it since it was loaded.
    if !db::messages::save(&state.db, &message).await? {
        return Err(AppError::Validation(SENT_MESSAGE_IMMUTABLE.into()));
    }

    let message = load(&state, &id).await?;
    tracing::info!(message_id = %message.id, ip = ?client.ip, "Message updated");
    Ok(Json(ApiResponse::success(message)))
}

/// DELETE /api/messages/:id
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    client: ApiClient,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let message = load(&state, &id).await?;
    if message.sent || !db::messages::delete_unsent(&state.db, &id).await? {
        return Err(AppError::Validation(
            "Cannot delete a message that has already been sent".into(),
        ));
    }

    tracing::info!(message_id = %id, ip = ?client.ip, "Message deleted");
    Ok(StatusCode::NO_CONTENT)
}
