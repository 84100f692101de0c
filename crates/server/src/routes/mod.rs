pub mod channels;
pub mod guilds;
pub mod messages;

use crate::error::AppError;
use crate::models::ApiResponse;
use crate::AppState;
use axum::{
    extract::OriginalUri,
    routing::{get, patch},
    Json, Router,
};
use herald_shared::constants::APP_NAME;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Messages
        .route("/messages", get(messages::list_messages).post(messages::create_message))
        .route(
            "/messages/{id}",
            get(messages::get_message)
                .patch(messages::update_message)
                .delete(messages::delete_message),
        )
        // Channels
        .route("/channels", get(channels::list_channels))
        .route("/channels/sync", get(channels::sync_channels).post(channels::sync_channels))
        .route("/channels/{channelId}", get(channels::get_channel))
        .route("/channels/{channelId}/status", patch(channels::update_channel_status))
        // Guilds
        .route("/guilds", get(guilds::list_guilds))
        .route("/guilds/sync", get(guilds::sync_guilds).post(guilds::sync_guilds))
        .route("/guilds/{guildId}", get(guilds::get_guild))
        .route("/guilds/{guildId}/channels", get(guilds::guild_channels))
        .route(
            "/guilds/{guildId}/status",
            get(guilds::get_guild_status).patch(guilds::update_guild_status),
        );

    Router::new()
        .route("/", get(root))
        .nest("/api", api_routes)
        .fallback(not_found)
        .with_state(state)
}

/// GET /
async fn root() -> Json<ApiResponse<serde_json::Value>> {
    Json(
        ApiResponse::success(serde_json::json!({
            "name": APP_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .message(format!("{} API is running", APP_NAME)),
    )
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri.path()))
}
