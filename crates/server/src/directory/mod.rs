//! Client-side view of the chat platform: guild and channel listings, message
//! delivery, and channel moderation.
//!
//! Handlers and the reconciliation engine only see [`Directory`]; the Discord
//! implementation lives in [`discord`] and tests plug in their own fake.

mod discord;

pub use discord::DiscordDirectory;

use async_trait::async_trait;
use serde::Serialize;

/// Errors produced by a directory backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid platform id: {0}")]
    InvalidId(String),

    #[error("Discord API error: {0}")]
    Platform(String),

    #[error("Discord client is not connected")]
    NotReady,
}

impl DirectoryError {
    /// Whether repeating the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Platform(_) | Self::NotReady)
    }
}

/// Entry of the guild listing. Owner and member counts need a per-guild
/// [`Directory::fetch_guild`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryGuild {
    pub id: String,
    pub name: String,
    pub member_count: i64,
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryChannel {
    pub id: String,
    pub name: String,
    pub guild_id: String,
    #[serde(rename = "type")]
    pub kind: i64,
}

/// Result of a moderation call against a channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Authenticates against the platform. Calls made before this return
    /// [`DirectoryError::NotReady`].
    async fn open(&self) -> Result<(), DirectoryError>;

    async fn close(&self);

    fn is_ready(&self) -> bool;

    /// Every guild the bot is a member of.
    async fn list_guilds(&self) -> Result<Vec<GuildRef>, DirectoryError>;

    async fn fetch_guild(&self, guild_id: &str) -> Result<DirectoryGuild, DirectoryError>;

    /// Every channel of the guild, unfiltered.
    async fn fetch_channels(&self, guild_id: &str) -> Result<Vec<DirectoryChannel>, DirectoryError>;

    /// Posts `content` and returns the platform message id.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, DirectoryError>;

    async fn set_channel_visibility(
        &self,
        channel_id: &str,
        hidden: bool,
    ) -> Result<ChannelStatus, DirectoryError>;

    async fn archive_channel(&self, channel_id: &str) -> Result<ChannelStatus, DirectoryError>;
}
