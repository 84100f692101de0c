use sqlx::SqlitePool;

use crate::models::{Channel, Guild, GuildUpsert};

/// What [`upsert`] did to the stored guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated { renamed: bool },
}

pub async fn find(pool: &SqlitePool, include_inactive: bool) -> Result<Vec<Guild>, sqlx::Error> {
    if include_inactive {
        sqlx::query_as::<_, Guild>("SELECT * FROM guilds ORDER BY name ASC")
            .fetch_all(pool)
            .await
    } else {
        sqlx::query_as::<_, Guild>("SELECT * FROM guilds WHERE is_active = 1 ORDER BY name ASC")
            .fetch_all(pool)
            .await
    }
}

pub async fn find_one(pool: &SqlitePool, guild_id: &str) -> Result<Option<Guild>, sqlx::Error> {
    sqlx::query_as::<_, Guild>("SELECT * FROM guilds WHERE guild_id = ?")
        .bind(guild_id)
        .fetch_optional(pool)
        .await
}

/// Inserts or refreshes the guild keyed on `guild_id`. A re-synced guild is
/// marked active again.
pub async fn upsert(pool: &SqlitePool, guild: &GuildUpsert) -> Result<UpsertOutcome, sqlx::Error> {
    let now = super::now();
    let previous_name = sqlx::query_scalar::<_, String>("SELECT name FROM guilds WHERE guild_id = ?")
        .bind(&guild.guild_id)
        .fetch_optional(pool)
        .await?;

    sqlx::query(
        "INSERT INTO guilds (id, guild_id, name, member_count, owner_id, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 1, ?, ?)
         ON CONFLICT(guild_id) DO UPDATE SET
            name = excluded.name,
            member_count = excluded.member_count,
            owner_id = excluded.owner_id,
            is_active = 1,
            updated_at = excluded.updated_at",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&guild.guild_id)
    .bind(&guild.name)
    .bind(guild.member_count.max(0))
    .bind(&guild.owner_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(match previous_name {
        None => UpsertOutcome::Created,
        Some(name) => UpsertOutcome::Updated {
            renamed: name != guild.name,
        },
    })
}

pub async fn update_status(
    pool: &SqlitePool,
    guild_id: &str,
    is_active: bool,
) -> Result<Option<Guild>, sqlx::Error> {
    let result = sqlx::query("UPDATE guilds SET is_active = ?, updated_at = ? WHERE guild_id = ?")
        .bind(is_active)
        .bind(super::now())
        .bind(guild_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find_one(pool, guild_id).await
}

/// Appends channel references to the guild, skipping ones already linked.
pub async fn add_channels(
    pool: &SqlitePool,
    guild_id: &str,
    channel_ids: &[String],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut added = 0;
    for channel_id in channel_ids {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO guild_channels (guild_id, channel_id, position)
             VALUES (?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM guild_channels WHERE guild_id = ?))",
        )
        .bind(guild_id)
        .bind(channel_id)
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;
        added += result.rows_affected();
    }
    tx.commit().await?;
    Ok(added)
}

/// Channels referenced by the guild, in the order they were linked.
pub async fn channels(pool: &SqlitePool, guild_id: &str) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        "SELECT c.* FROM guild_channels gc
         JOIN channels c ON c.channel_id = gc.channel_id
         WHERE gc.guild_id = ?
         ORDER BY gc.position ASC",
    )
    .bind(guild_id)
    .fetch_all(pool)
    .await
}
