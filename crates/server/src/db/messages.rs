use sqlx::SqlitePool;

use crate::models::ScheduledMessage;

pub async fn create(
    pool: &SqlitePool,
    content: &str,
    channel_id: &str,
    scheduled_for: &str,
) -> Result<ScheduledMessage, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = super::now();

    sqlx::query(
        "INSERT INTO scheduled_messages (id, content, channel_id, scheduled_for, sent, created_at, updated_at)
         VALUES (?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(content)
    .bind(channel_id)
    .bind(scheduled_for)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(ScheduledMessage {
        id,
        content: content.to_string(),
        channel_id: channel_id.to_string(),
        scheduled_for: scheduled_for.to_string(),
        sent: false,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// All messages, earliest schedule first. `sent` narrows to one state.
pub async fn find(pool: &SqlitePool, sent: Option<bool>) -> Result<Vec<ScheduledMessage>, sqlx::Error> {
    match sent {
        Some(sent) => {
            sqlx::query_as::<_, ScheduledMessage>(
                "SELECT * FROM scheduled_messages WHERE sent = ? ORDER BY scheduled_for ASC, created_at ASC",
            )
            .bind(sent)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, ScheduledMessage>(
                "SELECT * FROM scheduled_messages ORDER BY scheduled_for ASC, created_at ASC",
            )
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn find_one(pool: &SqlitePool, id: &str) -> Result<Option<ScheduledMessage>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledMessage>("SELECT * FROM scheduled_messages WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Unsent messages whose schedule is at or before `now`, earliest first.
pub async fn find_due(pool: &SqlitePool, now: &str) -> Result<Vec<ScheduledMessage>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledMessage>(
        "SELECT * FROM scheduled_messages
         WHERE sent = 0 AND scheduled_for <= ?
         ORDER BY scheduled_for ASC, created_at ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Writes the editable fields back and stamps `updated_at`. Only unsent rows
/// are touched; returns whether a row changed.
pub async fn save(pool: &SqlitePool, message: &ScheduledMessage) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE scheduled_messages
         SET content = ?, channel_id = ?, scheduled_for = ?, updated_at = ?
         WHERE id = ? AND sent = 0",
    )
    .bind(&message.content)
    .bind(&message.channel_id)
    .bind(&message.scheduled_for)
    .bind(super::now())
    .bind(&message.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Flips `sent`. Returns false when the row is gone or already sent.
pub async fn mark_sent(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE scheduled_messages SET sent = 1, updated_at = ? WHERE id = ? AND sent = 0",
    )
    .bind(super::now())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes an unsent message. Returns whether a row was removed.
pub async fn delete_unsent(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM scheduled_messages WHERE id = ? AND sent = 0")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
