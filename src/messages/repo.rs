use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::messages::repo_types::{Direction, MessageLog};

pub async fn append(
    db: &PgPool,
    user_id: Option<Uuid>,
    direction: Direction,
    payload: &serde_json::Value,
    at: OffsetDateTime,
) -> anyhow::Result<MessageLog> {
    let row = sqlx::query_as::<_, MessageLog>(
        r#"
        INSERT INTO message_logs (user_id, direction, payload, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, created_at, direction, payload
        "#,
    )
    .bind(user_id)
    .bind(direction.as_str())
    .bind(payload)
    .bind(at)
    .fetch_one(db)
    .await
    .context("insert message log")?;
    Ok(row)
}

/// Whether an outbound message of `kind` was delivered to the user in `[start, end)`.
/// Rows logged with `delivered: false` do not count.
pub async fn has_delivered_outbound_between(
    db: &PgPool,
    user_id: Uuid,
    kind: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> anyhow::Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
              FROM message_logs
             WHERE user_id = $1
               AND direction = 'OUT'
               AND payload->>'type' = $2
               AND payload->>'delivered' = 'true'
               AND created_at >= $3 AND created_at < $4
        )
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(start)
    .bind(end)
    .fetch_one(db)
    .await
    .context("check outbound log")?;
    Ok(exists)
}
