use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{Channel, ChannelQuery, ChannelUpsert};

/// Counts reported by [`bulk_upsert`], named after document-store bulk writes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkWriteResult {
    /// Records whose `channel_id` already existed.
    pub matched: u64,
    /// Matched records whose stored fields changed.
    pub modified: u64,
    /// Records inserted.
    pub upserted: u64,
    /// Records rejected by a constraint; the rest of the batch still applies.
    pub write_errors: u64,
    /// `channel_id`s that are stored after the batch, in input order.
    pub written: Vec<String>,
}

/// Destination of channel chunks during a directory sync.
#[async_trait]
pub trait ChannelWriter: Send + Sync {
    async fn bulk_upsert(&self, records: &[ChannelUpsert]) -> Result<BulkWriteResult, sqlx::Error>;
}

#[async_trait]
impl ChannelWriter for SqlitePool {
    async fn bulk_upsert(&self, records: &[ChannelUpsert]) -> Result<BulkWriteResult, sqlx::Error> {
        bulk_upsert(self, records).await
    }
}

pub async fn find(pool: &SqlitePool, query: &ChannelQuery) -> Result<Vec<Channel>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM channels WHERE 1 = 1");
    if let Some(guild_id) = &query.guild_id {
        builder.push(" AND guild_id = ").push_bind(guild_id.clone());
    }
    if let Some(active) = query.active {
        builder.push(" AND is_active = ").push_bind(active);
    }
    if let Some(channel_type) = query.channel_type {
        builder.push(" AND type = ").push_bind(channel_type);
    }
    builder.push(" ORDER BY guild_name ASC, name ASC");

    builder.build_query_as::<Channel>().fetch_all(pool).await
}

pub async fn find_one(pool: &SqlitePool, channel_id: &str) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE channel_id = ?")
        .bind(channel_id)
        .fetch_optional(pool)
        .await
}

/// Inserts or updates every record keyed on `channel_id`, in one transaction.
///
/// Unordered: a record that violates a constraint (for example a second
/// channel with the same name in a guild) is skipped and counted, while
/// connection-level failures abort and roll back the whole batch.
/// The active flag of existing rows is left alone.
pub async fn bulk_upsert(
    pool: &SqlitePool,
    records: &[ChannelUpsert],
) -> Result<BulkWriteResult, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut result = BulkWriteResult::default();
    let now = super::now();

    for record in records {
        let existing = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE channel_id = ?")
            .bind(&record.channel_id)
            .fetch_optional(&mut *tx)
            .await?;

        let write = match existing {
            None => {
                sqlx::query(
                    "INSERT INTO channels (id, channel_id, name, guild_id, guild_name, type, is_active, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&record.channel_id)
                .bind(&record.name)
                .bind(&record.guild_id)
                .bind(&record.guild_name)
                .bind(record.channel_type)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map(|_| result.upserted += 1)
            }
            Some(current) => {
                result.matched += 1;
                let unchanged = current.name == record.name
                    && current.guild_id == record.guild_id
                    && current.guild_name == record.guild_name
                    && current.channel_type == record.channel_type;
                if unchanged {
                    Ok(())
                } else {
                    sqlx::query(
                        "UPDATE channels SET name = ?, guild_id = ?, guild_name = ?, type = ?, updated_at = ?
                         WHERE channel_id = ?",
                    )
                    .bind(&record.name)
                    .bind(&record.guild_id)
                    .bind(&record.guild_name)
                    .bind(record.channel_type)
                    .bind(&now)
                    .bind(&record.channel_id)
                    .execute(&mut *tx)
                    .await
                    .map(|_| result.modified += 1)
                }
            }
        };

        match write {
            Ok(()) => result.written.push(record.channel_id.clone()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() || e.is_check_violation() => {
                tracing::warn!(channel_id = %record.channel_id, "Skipping channel: {}", e);
                result.write_errors += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tx.commit().await?;
    Ok(result)
}

/// Sets the active flag. Returns the updated row, or `None` if unknown.
pub async fn update_status(
    pool: &SqlitePool,
    channel_id: &str,
    is_active: bool,
) -> Result<Option<Channel>, sqlx::Error> {
    let result = sqlx::query("UPDATE channels SET is_active = ?, updated_at = ? WHERE channel_id = ?")
        .bind(is_active)
        .bind(super::now())
        .bind(channel_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find_one(pool, channel_id).await
}

/// Rewrites the cached guild name on every channel of the guild.
pub async fn refresh_guild_name(
    pool: &SqlitePool,
    guild_id: &str,
    guild_name: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE channels SET guild_name = ?, updated_at = ? WHERE guild_id = ? AND guild_name != ?",
    )
    .bind(guild_name)
    .bind(super::now())
    .bind(guild_id)
    .bind(guild_name)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
