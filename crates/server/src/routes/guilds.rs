use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use std::sync::Arc;

use crate::db;
use crate::error::AppError;
use crate::models::{
    ApiClient, ApiResponse, ChannelView, Guild, GuildQuery, GuildStatusView, GuildView,
    UpdateGuildStatusRequest,
};
use crate::reconcile::{SyncScope, SyncSummary};
use crate::AppState;

async fn load(state: &AppState, guild_id: &str) -> Result<Guild, AppError> {
    db::guilds::find_one(&state.db, guild_id)
        .await?
        .ok_or_else(|| AppError::not_found("Guild"))
}

/// Stored guild plus its linked channels and, if reachable, the live
/// platform record.
async fn guild_view(state: &AppState, guild: Guild) -> Result<GuildView, AppError> {
    let channels = db::guilds::channels(&state.db, &guild.guild_id)
        .await?
        .into_iter()
        .map(ChannelView::from)
        .collect();

    let discord_data = match state.directory.fetch_guild(&guild.guild_id).await {
        Ok(live) => Some(live),
        Err(e) => {
            tracing::warn!(guild_id = %guild.guild_id, "Could not fetch live guild data: {}", e);
            None
        }
    };

    Ok(GuildView {
        summary: guild.summary(),
        guild,
        channels,
        discord_data,
    })
}

/// GET /api/guilds
pub async fn list_guilds(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    query: Result<Query<GuildQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<GuildView>>>, AppError> {
    let Query(query) = query?;
    let guilds = db::guilds::find(&state.db, query.include_inactive).await?;

    let mut views = Vec::with_capacity(guilds.len());
    for guild in guilds {
        views.push(guild_view(&state, guild).await?);
    }
    Ok(Json(ApiResponse::list(views)))
}

/// GET|POST /api/guilds/sync
pub async fn sync_guilds(
    State(state): State<Arc<AppState>>,
    client: ApiClient,
) -> Result<Json<ApiResponse<SyncSummary>>, AppError> {
    tracing::info!(ip = ?client.ip, "Guild sync requested");
    let summary = state.synchronizer.run(SyncScope::All).await?;
    Ok(Json(
        ApiResponse::success(summary).message("Guilds synchronized successfully"),
    ))
}

/// GET /api/guilds/:guildId
pub async fn get_guild(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    Path(guild_id): Path<String>,
) -> Result<Json<ApiResponse<GuildView>>, AppError> {
    let guild = load(&state, &guild_id).await?;
    Ok(Json(ApiResponse::success(guild_view(&state, guild).await?)))
}

/// GET /api/guilds/:guildId/channels
pub async fn guild_channels(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    Path(guild_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ChannelView>>>, AppError> {
    let guild = load(&state, &guild_id).await?;
    let channels = db::guilds::channels(&state.db, &guild.guild_id).await?;
    Ok(Json(ApiResponse::list(
        channels.into_iter().map(ChannelView::from).collect(),
    )))
}

/// GET /api/guilds/:guildId/status
pub async fn get_guild_status(
    State(state): State<Arc<AppState>>,
    _client: ApiClient,
    Path(guild_id): Path<String>,
) -> Result<Json<ApiResponse<GuildStatusView>>, AppError> {
    let guild = load(&state, &guild_id).await?;
    let live = state
        .directory
        .fetch_guild(&guild.guild_id)
        .await
        .map_err(|e| AppError::ExternalService(format!("Error fetching guild status: {}", e)))?;

    Ok(Json(ApiResponse::success(GuildStatusView {
        guild_id: guild.guild_id,
        name: guild.name,
        is_active: guild.is_active,
        member_count: guild.member_count,
        discord: live,
    })))
}

/// PATCH /api/guilds/:guildId/status
pub async fn update_guild_status(
    State(state): State<Arc<AppState>>,
    client: ApiClient,
    Path(guild_id): Path<String>,
    body: Result<Json<UpdateGuildStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Guild>>, AppError> {
    let Json(body) = body?;
    let is_active = body
        .is_active
        .ok_or_else(|| AppError::Validation("isActive is required".into()))?;

    let guild = db::guilds::update_status(&state.db, &guild_id, is_active)
        .await?
        .ok_or_else(|| AppError::not_found("Guild"))?;
    tracing::info!(guild_id = %guild.guild_id, is_active, ip = ?client.ip, "Guild status updated");
    Ok(Json(ApiResponse::success(guild)))
}
