use herald_shared::constants::channel_type_name;
use serde::{Deserialize, Serialize};

use crate::directory::ChannelStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub channel_id: String,
    pub name: String,
    pub guild_id: String,
    pub guild_name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub channel_type: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Channel {
    pub fn type_name(&self) -> &'static str {
        channel_type_name(self.channel_type)
    }

    pub fn display_name(&self) -> String {
        format!("{} > {}", self.guild_name, self.name)
    }
}

/// Channel as returned by the API, with derived labels.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    #[serde(flatten)]
    pub channel: Channel,
    pub type_name: &'static str,
    pub display_name: String,
}

impl From<Channel> for ChannelView {
    fn from(channel: Channel) -> Self {
        Self {
            type_name: channel.type_name(),
            display_name: channel.display_name(),
            channel,
        }
    }
}

/// Fields written by a directory sync, keyed on `channel_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpsert {
    pub channel_id: String,
    pub name: String,
    pub guild_id: String,
    pub guild_name: String,
    pub channel_type: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelQuery {
    pub guild_id: Option<String>,
    pub active: Option<bool>,
    #[serde(rename = "type")]
    pub channel_type: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChannelStatusRequest {
    pub is_active: Option<bool>,
    pub hidden: Option<bool>,
    #[serde(default)]
    pub archive: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQuery {
    pub guild_id: Option<String>,
}

/// Stored channel after a status change, with the platform's answer when a
/// moderation call was made.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatusView {
    pub channel: ChannelView,
    pub discord: Option<ChannelStatus>,
}
