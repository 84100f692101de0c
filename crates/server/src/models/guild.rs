use herald_shared::validation::format_member_count;
use serde::{Deserialize, Serialize};

use super::ChannelView;
use crate::directory::DirectoryGuild;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: String,
    pub guild_id: String,
    pub name: String,
    pub member_count: i64,
    pub owner_id: String,
    pub is_active: bool,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub region: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Guild {
    pub fn summary(&self) -> String {
        format!("{} - {} members", self.name, format_member_count(self.member_count))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildView {
    #[serde(flatten)]
    pub guild: Guild,
    pub summary: String,
    pub channels: Vec<ChannelView>,
    pub discord_data: Option<DirectoryGuild>,
}

/// Fields written by a directory sync, keyed on `guild_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildUpsert {
    pub guild_id: String,
    pub name: String,
    pub member_count: i64,
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGuildStatusRequest {
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildStatusView {
    pub guild_id: String,
    pub name: String,
    pub is_active: bool,
    pub member_count: i64,
    pub discord: DirectoryGuild,
}
