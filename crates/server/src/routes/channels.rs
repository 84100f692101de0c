use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use herald_shared::validation::validate_snowflake;
use std::sync::Arc;

use crate::db;
use crate::error::AppError;
use crate::models::{
    ApiClient, ApiResponse, ChannelQuery, ChannelStatusView, ChannelView, SyncQuery,
    UpdateChannelStatusRequest,
};
use crate::reconcile::{SyncScope, SyncSummary};
use crate::AppState;

/// GET /api/channels
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    query: Result<Query<ChannelQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ChannelView>>>, AppError> {
    let Query(query) = query?;
    let channels = db::channels::find(&state.db, &query).await?;
    Ok(Json(ApiResponse::list(
        channels.into_iter().map(ChannelView::from).collect(),
    )))
}

/// GET|POST /api/channels/sync
pub async fn sync_channels(
    State(state): State<Arc<AppState>>,
    client: ApiClient,
    query: Result<Query<SyncQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<SyncSummary>>, AppError> {
    let Query(query) = query?;
    let scope = match query.guild_id.filter(|id| !id.is_empty()) {
        Some(guild_id) => {
            validate_snowflake("Guild", &guild_id).map_err(AppError::Validation)?;
            SyncScope::Guild(guild_id)
        }
        None => SyncScope::All,
    };
    tracing::info!(?scope, ip = ?client.ip, "Channel sync requested");

    let summary = state.synchronizer.run(scope).await?;
    Ok(Json(
        ApiResponse::success(summary).message("Channels synchronized successfully"),
    ))
}

/// GET /api/channels/:channelId
pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    Path(channel_id): Path<String>,
) -> Result<Json<ApiResponse<ChannelView>>, AppError> {
    let channel = db::channels::find_one(&state.db, &channel_id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel"))?;
    Ok(Json(ApiResponse::success(channel.into())))
}

/// PATCH /api/channels/:channelId/status
///
/// `archive` moves the channel out of sight on the platform and deactivates
/// it; `hidden` toggles `@everyone` visibility; `isActive` only touches the
/// stored flag.
pub async fn update_channel_status(
    State(state): State<Arc<AppState>>,
    client: ApiClient,
    Path(channel_id): Path<String>,
    body: Result<Json<UpdateChannelStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChannelStatusView>>, AppError> {
    let Json(body) = body?;
    if body.is_active.is_none() && body.hidden.is_none() && !body.archive {
        return Err(AppError::Validation(
            "One of isActive, hidden or archive is required".into(),
        ));
    }

    let channel = db::channels::find_one(&state.db, &channel_id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel"))?;

    let discord = if body.archive {
        Some(state.directory.archive_channel(&channel.channel_id).await?)
    } else if let Some(hidden) = body.hidden {
        Some(
            state
                .directory
                .set_channel_visibility(&channel.channel_id, hidden)
                .await?,
        )
    } else {
        None
    };

    let is_active = match (body.is_active, body.archive) {
        (Some(active), _) => Some(active),
        (None, true) => Some(false),
        (None, false) => None,
    };
    let channel = match is_active {
        Some(active) => db::channels::update_status(&state.db, &channel_id, active)
            .await?
            .ok_or_else(|| AppError::not_found("Channel"))?,
        None => channel,
    };

    tracing::info!(
        channel_id = %channel.channel_id,
        is_active = channel.is_active,
        archived = body.archive,
        hidden = ?body.hidden,
        ip = ?client.ip,
        "Channel status updated"
    );

    Ok(Json(ApiResponse::success(ChannelStatusView {
        channel: channel.into(),
        discord,
    })))
}
