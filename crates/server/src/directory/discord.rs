use async_trait::async_trait;
use serenity::builder::{CreateChannel, EditChannel};
use serenity::http::{GuildPagination, Http, HttpError};
use serenity::model::channel::{
    ChannelType, GuildChannel, PermissionOverwrite, PermissionOverwriteType,
};
use serenity::model::id::{ChannelId, GuildId, RoleId};
use serenity::model::permissions::Permissions;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ChannelStatus, Directory, DirectoryChannel, DirectoryError, DirectoryGuild, GuildRef};

/// Discord caps `GET /users/@me/guilds` at 200 entries per page.
const GUILD_PAGE_SIZE: u64 = 200;
const ARCHIVE_CATEGORY: &str = "Archived";
const ARCHIVE_CATEGORY_POSITION: u16 = 999;

/// [`Directory`] backed by Discord's REST API through serenity's [`Http`] client.
pub struct DiscordDirectory {
    http: Http,
    ready: AtomicBool,
}

impl DiscordDirectory {
    pub fn new(token: &str) -> Self {
        Self {
            http: Http::new(token),
            ready: AtomicBool::new(false),
        }
    }

    fn http(&self) -> Result<&Http, DirectoryError> {
        if self.is_ready() {
            Ok(&self.http)
        } else {
            Err(DirectoryError::NotReady)
        }
    }

    async fn guild_channel(&self, channel_id: ChannelId) -> Result<GuildChannel, DirectoryError> {
        let channel = channel_id.to_channel(self.http()?).await?;
        channel
            .guild()
            .ok_or_else(|| DirectoryError::NotFound("Discord guild channel".into()))
    }

    async fn guild_info(&self, guild_id: GuildId) -> Result<DirectoryGuild, DirectoryError> {
        let guild = self.http()?.get_guild_with_counts(guild_id).await?;
        Ok(DirectoryGuild {
            id: guild.id.get().to_string(),
            name: guild.name,
            member_count: guild.approximate_member_count.unwrap_or(0) as i64,
            owner_id: guild.owner_id.get().to_string(),
        })
    }

    /// Finds the guild's archive category, creating a hidden one when missing.
    async fn archive_category(&self, guild_id: GuildId) -> Result<ChannelId, DirectoryError> {
        let http = self.http()?;
        let channels = guild_id.channels(http).await?;
        if let Some(existing) = channels.values().find(|c| {
            c.kind == ChannelType::Category && c.name.eq_ignore_ascii_case(ARCHIVE_CATEGORY)
        }) {
            return Ok(existing.id);
        }

        let builder = CreateChannel::new(ARCHIVE_CATEGORY)
            .kind(ChannelType::Category)
            .position(ARCHIVE_CATEGORY_POSITION)
            .permissions(vec![everyone_overwrite(
                guild_id,
                Permissions::empty(),
                Permissions::VIEW_CHANNEL,
            )]);
        let category = guild_id.create_channel(http, builder).await?;
        tracing::info!(guild_id = %guild_id, category_id = %category.id, "Created archive category");
        Ok(category.id)
    }
}

#[async_trait]
impl Directory for DiscordDirectory {
    async fn open(&self) -> Result<(), DirectoryError> {
        let user = self.http.get_current_user().await?;
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("Discord bot logged in as {}", user.name);
        Ok(())
    }

    async fn close(&self) {
        self.ready.store(false, Ordering::SeqCst);
        tracing::info!("Discord client closed");
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn list_guilds(&self) -> Result<Vec<GuildRef>, DirectoryError> {
        let http = self.http()?;
        let mut guilds = Vec::new();
        let mut after = None;
        loop {
            let page = http
                .get_guilds(after.map(GuildPagination::After), Some(GUILD_PAGE_SIZE))
                .await?;
            let full_page = page.len() as u64 == GUILD_PAGE_SIZE;
            after = page.last().map(|g| g.id);
            guilds.extend(page.into_iter().map(|g| GuildRef {
                id: g.id.get().to_string(),
                name: g.name,
            }));
            if !full_page {
                break;
            }
        }
        tracing::info!("Found {} guilds", guilds.len());
        Ok(guilds)
    }

    async fn fetch_guild(&self, guild_id: &str) -> Result<DirectoryGuild, DirectoryError> {
        self.guild_info(GuildId::new(parse_snowflake(guild_id)?)).await
    }

    async fn fetch_channels(&self, guild_id: &str) -> Result<Vec<DirectoryChannel>, DirectoryError> {
        let id = GuildId::new(parse_snowflake(guild_id)?);
        let channels = self.http()?.get_channels(id).await?;
        tracing::debug!(guild_id = %id, "Found {} channels", channels.len());
        Ok(channels
            .into_iter()
            .map(|c| DirectoryChannel {
                id: c.id.get().to_string(),
                name: c.name,
                guild_id: c.guild_id.get().to_string(),
                kind: i64::from(u8::from(c.kind)),
            })
            .collect())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, DirectoryError> {
        let id = ChannelId::new(parse_snowflake(channel_id)?);
        let message = id.say(self.http()?, content).await?;
        tracing::info!(channel_id = %id, message_id = %message.id, "Message sent");
        Ok(message.id.get().to_string())
    }

    async fn set_channel_visibility(
        &self,
        channel_id: &str,
        hidden: bool,
    ) -> Result<ChannelStatus, DirectoryError> {
        let id = ChannelId::new(parse_snowflake(channel_id)?);
        let channel = self.guild_channel(id).await?;

        let flags = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        let overwrite = if hidden {
            everyone_overwrite(channel.guild_id, Permissions::empty(), flags)
        } else {
            everyone_overwrite(channel.guild_id, flags, Permissions::empty())
        };
        id.create_permission(self.http()?, overwrite).await?;

        tracing::info!(channel_id = %id, visible = !hidden, "Channel visibility updated");
        Ok(ChannelStatus {
            id: id.get().to_string(),
            name: channel.name,
            kind: i64::from(u8::from(channel.kind)),
            hidden: Some(hidden),
            archived: false,
            category_id: channel.parent_id.map(|p| p.get().to_string()),
        })
    }

    async fn archive_channel(&self, channel_id: &str) -> Result<ChannelStatus, DirectoryError> {
        let id = ChannelId::new(parse_snowflake(channel_id)?);
        let channel = self.guild_channel(id).await?;
        let category = self.archive_category(channel.guild_id).await?;

        let builder = EditChannel::new()
            .name(format!("archived-{}", channel.name))
            .category(Some(category))
            .permissions(vec![everyone_overwrite(
                channel.guild_id,
                Permissions::empty(),
                Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
            )]);
        let archived = id.edit(self.http()?, builder).await?;

        tracing::info!(channel_id = %id, "Channel has been archived");
        Ok(ChannelStatus {
            id: archived.id.get().to_string(),
            name: archived.name,
            kind: i64::from(u8::from(archived.kind)),
            hidden: Some(true),
            archived: true,
            category_id: Some(category.get().to_string()),
        })
    }
}

/// The `@everyone` role shares its id with the guild.
fn everyone_overwrite(guild_id: GuildId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
    PermissionOverwrite {
        allow,
        deny,
        kind: PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
    }
}

/// Serenity id constructors panic on zero, so ids are checked here first.
fn parse_snowflake(id: &str) -> Result<u64, DirectoryError> {
    match id.parse::<u64>() {
        Ok(n) if n != 0 => Ok(n),
        _ => Err(DirectoryError::InvalidId(id.to_string())),
    }
}

impl From<serenity::Error> for DirectoryError {
    fn from(e: serenity::Error) -> Self {
        if let serenity::Error::Http(HttpError::UnsuccessfulRequest(ref response)) = e {
            if response.status_code.as_u16() == 404 {
                return DirectoryError::NotFound(format!("Discord resource ({})", response.error.message));
            }
        }
        DirectoryError::Platform(e.to_string())
    }
}
