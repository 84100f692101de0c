use herald_shared::constants::*;
use herald_shared::validation::validate_snowflake;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::RetryPolicy;
use crate::config::Config;
use crate::db;
use crate::db::channels::ChannelWriter;
use crate::db::guilds::UpsertOutcome;
use crate::directory::{Directory, DirectoryChannel, DirectoryError, DirectoryGuild, GuildRef};
use crate::error::AppError;
use crate::models::{ChannelUpsert, GuildUpsert};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub chunk_size: usize,
    /// Fixed delay between consecutive guild fetches and between chunk writes.
    pub pacing: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            chunk_size: SYNC_CHUNK_SIZE,
            pacing: Duration::from_millis(SYNC_PACING_MS),
            retry: RetryPolicy::new(SYNC_RETRY_ATTEMPTS, Duration::from_millis(SYNC_RETRY_BASE_MS)),
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.sync_chunk_size.max(1),
            pacing: Duration::from_millis(config.sync_pacing_ms),
            retry: RetryPolicy::new(
                config.sync_retry_attempts,
                Duration::from_millis(config.sync_retry_base_ms),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    All,
    Guild(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildFailure {
    pub guild_id: String,
    pub guild_name: String,
    pub message: String,
}

/// Totals for one sync run. Guild counters add up to the number of guilds
/// fetched; channel counters cover every chunk that was applied.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
    pub progress: u64,
    pub invalid: usize,
    pub write_errors: u64,
    pub batches: usize,
    pub errors: Vec<GuildFailure>,
}

#[derive(Debug, thiserror::Error)]
enum GuildSyncError {
    #[error("{0}")]
    Directory(#[from] DirectoryError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Missing required guild data")]
    Invalid,
}

/// Pulls guilds and their text channels from the directory into the store.
pub struct Synchronizer {
    db: SqlitePool,
    directory: Arc<dyn Directory>,
    writer: Arc<dyn ChannelWriter>,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(db: SqlitePool, directory: Arc<dyn Directory>, options: SyncOptions) -> Self {
        Self {
            writer: Arc::new(db.clone()),
            db,
            directory,
            options,
        }
    }

    /// Sends channel chunks to `writer` instead of the pool.
    pub fn with_writer(mut self, writer: Arc<dyn ChannelWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Runs a sync to completion. Guilds fail independently and are reported
    /// in the summary; only failing to list the guilds at all is an error.
    pub async fn run(&self, scope: SyncScope) -> Result<SyncSummary, AppError> {
        info!(?scope, "Directory sync started");
        let directory = self.directory.as_ref();
        let retry = self.options.retry;

        let targets: Vec<(GuildRef, Option<DirectoryGuild>)> = match &scope {
            SyncScope::All => retry
                .run_if("list guilds", move || directory.list_guilds(), DirectoryError::is_transient)
                .await?
                .into_iter()
                .map(|guild| (guild, None))
                .collect(),
            SyncScope::Guild(guild_id) => {
                let guild_id = guild_id.as_str();
                let guild = retry
                    .run_if(
                        "fetch guild",
                        move || directory.fetch_guild(guild_id),
                        DirectoryError::is_transient,
                    )
                    .await?;
                let target = GuildRef {
                    id: guild.id.clone(),
                    name: guild.name.clone(),
                };
                vec![(target, Some(guild))]
            }
        };

        let mut summary = SyncSummary::default();
        for (index, (target, details)) in targets.into_iter().enumerate() {
            if index > 0 {
                self.pace().await;
            }
            match self.sync_guild(&target, details, &mut summary).await {
                Ok(UpsertOutcome::Created) => summary.created += 1,
                Ok(UpsertOutcome::Updated { .. }) => summary.updated += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(guild_id = %target.id, "Error syncing guild {}: {}", display_name(&target), e);
                    summary.errors.push(GuildFailure {
                        guild_id: target.id,
                        guild_name: target.name,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
            matched = summary.matched,
            upserted = summary.upserted,
            batches = summary.batches,
            "Directory sync completed"
        );
        Ok(summary)
    }

    /// Syncs one guild. `details` is the already fetched guild record, if any;
    /// otherwise owner and member count are fetched here.
    async fn sync_guild(
        &self,
        target: &GuildRef,
        details: Option<DirectoryGuild>,
        summary: &mut SyncSummary,
    ) -> Result<UpsertOutcome, GuildSyncError> {
        let directory = self.directory.as_ref();
        let pool = &self.db;
        let writer = self.writer.as_ref();
        let retry = self.options.retry;

        let guild = match details {
            Some(guild) => guild,
            None => {
                let target_id = target.id.as_str();
                let guild = retry
                    .run_if(
                        &format!("fetch guild {}", target_id),
                        move || directory.fetch_guild(target_id),
                        DirectoryError::is_transient,
                    )
                    .await?;
                self.pace().await;
                guild
            }
        };
        if guild.id.is_empty() || guild.name.trim().is_empty() || guild.owner_id.is_empty() {
            return Err(GuildSyncError::Invalid);
        }
        let guild = &guild;
        let guild_id = guild.id.as_str();

        let fetched = retry
            .run_if(
                &format!("fetch channels for guild {}", guild_id),
                move || directory.fetch_channels(guild_id),
                DirectoryError::is_transient,
            )
            .await?;
        let fetched_count = fetched.len();

        let (records, invalid) = prepare_channels(guild, fetched);
        summary.invalid += invalid;
        info!(guild_id, "Found {} channels in guild {}, {} to sync", fetched_count, guild.name, records.len());

        let mut linked = Vec::with_capacity(records.len());
        for (index, chunk) in records.chunks(self.options.chunk_size).enumerate() {
            if index > 0 {
                self.pace().await;
            }
            let label = format!("channel batch {} for guild {}", index + 1, guild_id);
            let result = retry
                .run(&label, move || writer.bulk_upsert(chunk))
                .await?;

            summary.batches += 1;
            summary.matched += result.matched;
            summary.modified += result.modified;
            summary.upserted += result.upserted;
            summary.write_errors += result.write_errors;
            summary.progress += chunk.len() as u64;
            linked.extend(result.written);
        }

        let record = GuildUpsert {
            guild_id: guild.id.clone(),
            name: guild.name.trim().to_string(),
            member_count: guild.member_count.max(0),
            owner_id: guild.owner_id.clone(),
        };
        let record = &record;
        let outcome = retry
            .run(&format!("upsert guild {}", guild_id), move || db::guilds::upsert(pool, record))
            .await?;

        if let UpsertOutcome::Updated { renamed: true } = outcome {
            let refreshed = db::channels::refresh_guild_name(pool, guild_id, &record.name).await?;
            info!(guild_id, refreshed, "Guild renamed, refreshed cached guild names");
        }
        db::guilds::add_channels(pool, guild_id, &linked).await?;

        info!(guild_id, "Synchronized guild: {}", guild.name);
        Ok(outcome)
    }

    async fn pace(&self) {
        if !self.options.pacing.is_zero() {
            tokio::time::sleep(self.options.pacing).await;
        }
    }
}

fn display_name(guild: &GuildRef) -> &str {
    if guild.name.is_empty() {
        "unknown"
    } else {
        &guild.name
    }
}

/// Keeps text-like channels and drops malformed ones with a warning.
/// Returns the records to write and the number dropped as invalid.
fn prepare_channels(guild: &DirectoryGuild, channels: Vec<DirectoryChannel>) -> (Vec<ChannelUpsert>, usize) {
    let mut invalid = 0;
    let records = channels
        .into_iter()
        .filter(|c| SYNCED_CHANNEL_TYPES.contains(&c.kind))
        .filter_map(|c| match validate_channel(&c) {
            Ok(()) => Some(ChannelUpsert {
                channel_id: c.id,
                name: c.name.trim().to_string(),
                guild_id: c.guild_id,
                guild_name: guild.name.trim().to_string(),
                channel_type: c.kind,
            }),
            Err(reason) => {
                warn!(guild_id = %guild.id, channel_id = %c.id, "Dropping invalid channel: {}", reason);
                invalid += 1;
                None
            }
        })
        .collect();
    (records, invalid)
}

fn validate_channel(channel: &DirectoryChannel) -> Result<(), String> {
    validate_snowflake("Channel", &channel.id)?;
    validate_snowflake("Guild", &channel.guild_id)?;
    if channel.name.trim().is_empty() {
        return Err("Channel name is required".into());
    }
    if !is_supported_channel_type(channel.kind) {
        return Err(format!("Unsupported channel type {}", channel.kind));
    }
    Ok(())
}
