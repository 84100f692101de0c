#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use herald_server::{
    config::Config,
    db,
    db::channels::{BulkWriteResult, ChannelWriter},
    directory::{ChannelStatus, Directory, DirectoryChannel, DirectoryError, DirectoryGuild, GuildRef},
    middleware::auth::hash_api_key,
    models::ChannelUpsert,
    reconcile::{RetryPolicy, SyncOptions},
    routes, AppState,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_TOKEN: &str = "test-api-token";
pub const TEST_SALT: &str = "test-salt";

/// Create an in-memory SQLite pool with schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    db::apply_schema(&pool).await.unwrap();
    pool
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        discord_token: "test-discord-token".into(),
        default_channel_id: Some("999".into()),
        api_key_hash: hash_api_key(TEST_TOKEN, TEST_SALT),
        api_key_salt: TEST_SALT.into(),
        cors_origins: vec![],
        dispatch_interval_secs: 60,
        sync_chunk_size: 100,
        sync_pacing_ms: 0,
        sync_retry_attempts: 3,
        sync_retry_base_ms: 0,
    }
}

/// Sync options with no pacing or backoff delays.
pub fn sync_options(chunk_size: usize) -> SyncOptions {
    SyncOptions {
        chunk_size,
        pacing: Duration::ZERO,
        retry: RetryPolicy::new(3, Duration::ZERO),
    }
}

/// Build a test Axum app with the given pool and directory.
pub fn create_test_app(pool: SqlitePool, directory: Arc<FakeDirectory>) -> Router {
    let state = Arc::new(AppState::new(pool, test_config(), directory));
    routes::build_router(state)
}

pub fn auth_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", TEST_TOKEN).parse().unwrap(),
    )
}

pub fn guild(id: &str, name: &str, member_count: i64) -> DirectoryGuild {
    DirectoryGuild {
        id: id.into(),
        name: name.into(),
        member_count,
        owner_id: "1".into(),
    }
}

pub fn channel(id: &str, name: &str, guild_id: &str, kind: i64) -> DirectoryChannel {
    DirectoryChannel {
        id: id.into(),
        name: name.into(),
        guild_id: guild_id.into(),
        kind,
    }
}

/// In-memory platform. Records deliveries and moderation calls, and fails on
/// demand per guild or channel.
#[derive(Default)]
pub struct FakeDirectory {
    guilds: Mutex<Vec<DirectoryGuild>>,
    channels: Mutex<HashMap<String, Vec<DirectoryChannel>>>,
    sent: Mutex<Vec<(String, String)>>,
    moderation: Mutex<Vec<String>>,
    failing_sends: Mutex<HashSet<String>>,
    failing_guilds: Mutex<HashSet<String>>,
    failing_details: Mutex<HashMap<String, DirectoryError>>,
    transient_channel_failures: AtomicU32,
    send_attempts: AtomicU32,
    send_delay_ms: AtomicU64,
    down: AtomicBool,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_guild(&self, guild: DirectoryGuild, channels: Vec<DirectoryChannel>) {
        self.channels.lock().unwrap().insert(guild.id.clone(), channels);
        let mut guilds = self.guilds.lock().unwrap();
        guilds.retain(|g| g.id != guild.id);
        guilds.push(guild);
    }

    pub fn remove_guild(&self, guild_id: &str) {
        self.guilds.lock().unwrap().retain(|g| g.id != guild_id);
    }

    pub fn fail_sends_to(&self, channel_id: &str) {
        self.failing_sends.lock().unwrap().insert(channel_id.into());
    }

    /// Channel listing for this guild always fails with a platform error.
    pub fn fail_guild(&self, guild_id: &str) {
        self.failing_guilds.lock().unwrap().insert(guild_id.into());
    }

    /// The guild stays in the listing, but fetching its details fails with `error`.
    pub fn fail_guild_details(&self, guild_id: &str, error: DirectoryError) {
        self.failing_details.lock().unwrap().insert(guild_id.into(), error);
    }

    /// Every send waits this long before it is recorded.
    pub fn set_send_delay(&self, delay: Duration) {
        self.send_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Sends started, including ones still in flight or failed.
    pub fn send_attempts(&self) -> u32 {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// The next `n` channel listings fail with a platform error.
    pub fn fail_channel_fetches(&self, n: u32) {
        self.transient_channel_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn moderation(&self) -> Vec<String> {
        self.moderation.lock().unwrap().clone()
    }

    fn check_up(&self) -> Result<(), DirectoryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DirectoryError::Platform("service unavailable".into()));
        }
        Ok(())
    }

    fn status(&self, channel_id: &str) -> Result<ChannelStatus, DirectoryError> {
        self.channels
            .lock()
            .unwrap()
            .values()
            .flatten()
            .find(|c| c.id == channel_id)
            .map(|c| ChannelStatus {
                id: c.id.clone(),
                name: c.name.clone(),
                kind: c.kind,
                hidden: None,
                archived: false,
                category_id: None,
            })
            .ok_or_else(|| DirectoryError::NotFound("Discord channel".into()))
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn open(&self) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn close(&self) {}

    fn is_ready(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }

    async fn list_guilds(&self) -> Result<Vec<GuildRef>, DirectoryError> {
        self.check_up()?;
        Ok(self
            .guilds
            .lock()
            .unwrap()
            .iter()
            .map(|g| GuildRef {
                id: g.id.clone(),
                name: g.name.clone(),
            })
            .collect())
    }

    async fn fetch_guild(&self, guild_id: &str) -> Result<DirectoryGuild, DirectoryError> {
        self.check_up()?;
        if let Some(error) = self.failing_details.lock().unwrap().get(guild_id) {
            return Err(error.clone());
        }
        self.guilds
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound("Discord guild".into()))
    }

    async fn fetch_channels(&self, guild_id: &str) -> Result<Vec<DirectoryChannel>, DirectoryError> {
        self.check_up()?;
        if self.failing_guilds.lock().unwrap().contains(guild_id) {
            return Err(DirectoryError::Platform("Missing Access".into()));
        }
        let pending = self.transient_channel_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_channel_failures.store(pending - 1, Ordering::SeqCst);
            return Err(DirectoryError::Platform("rate limited".into()));
        }
        Ok(self
            .channels
            .lock()
            .unwrap()
            .get(guild_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, DirectoryError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.send_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_up()?;
        if self.failing_sends.lock().unwrap().contains(channel_id) {
            return Err(DirectoryError::Platform("Missing Permissions".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel_id.into(), content.into()));
        Ok(format!("{}", 1000 + sent.len()))
    }

    async fn set_channel_visibility(
        &self,
        channel_id: &str,
        hidden: bool,
    ) -> Result<ChannelStatus, DirectoryError> {
        self.check_up()?;
        let mut status = self.status(channel_id)?;
        status.hidden = Some(hidden);
        self.moderation
            .lock()
            .unwrap()
            .push(format!("{}:{}", if hidden { "hide" } else { "show" }, channel_id));
        Ok(status)
    }

    async fn archive_channel(&self, channel_id: &str) -> Result<ChannelStatus, DirectoryError> {
        self.check_up()?;
        let mut status = self.status(channel_id)?;
        status.name = format!("archived-{}", status.name);
        status.archived = true;
        status.category_id = Some("777".into());
        self.moderation.lock().unwrap().push(format!("archive:{}", channel_id));
        Ok(status)
    }
}

/// Channel writer whose first `failures` calls fail like a locked database,
/// then delegate to the pool.
pub struct FlakyWriter {
    pool: SqlitePool,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl FlakyWriter {
    pub fn new(pool: SqlitePool, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            pool,
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelWriter for FlakyWriter {
    async fn bulk_upsert(&self, records: &[ChannelUpsert]) -> Result<BulkWriteResult, sqlx::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(sqlx::Error::PoolTimedOut);
        }
        db::channels::bulk_upsert(&self.pool, records).await
    }
}
