use async_trait::async_trait;
use chrono::{DateTime, Utc};
use es_domain::error::DomainResult as Result;
use es_domain::eventing::{MessageEnvelope, MessageQueue, effective_visibility_timeout};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use std::time::Duration;

/// 基于 `es_queue` 表的可见性超时队列，读取语义对齐 pgmq
#[derive(Debug, Default, Clone, Copy)]
pub struct PgMessageQueue;

impl PgMessageQueue {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageQueue for PgMessageQueue {
    type Session = PgConnection;

    async fn send(&self, session: &mut PgConnection, queue: &str, message: &Value) -> Result<i64> {
        let msg_id: i64 = sqlx::query_scalar(
            "INSERT INTO es_queue (queue_name, message) VALUES ($1, $2) RETURNING msg_id",
        )
        .bind(queue)
        .bind(Json(message))
        .fetch_one(&mut *session)
        .await?;
        Ok(msg_id)
    }

    async fn read(
        &self,
        session: &mut PgConnection,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<MessageEnvelope>> {
        let timeout = effective_visibility_timeout(visibility_timeout);

        let row = sqlx::query(
            r#"WITH next AS (
                   SELECT msg_id FROM es_queue
                   WHERE queue_name = $1 AND vt <= clock_timestamp()
                   ORDER BY msg_id
                   LIMIT 1
                   FOR UPDATE SKIP LOCKED
               )
               UPDATE es_queue q
               SET vt = clock_timestamp() + make_interval(secs => $2),
                   read_ct = q.read_ct + 1
               FROM next
               WHERE q.msg_id = next.msg_id
               RETURNING q.msg_id, q.read_ct, q.enqueued_at, q.vt, q.message"#,
        )
        .bind(queue)
        .bind(timeout.as_secs_f64())
        .fetch_optional(&mut *session)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Json(message): Json<Value> = row.try_get("message")?;
        Ok(Some(
            MessageEnvelope::builder()
                .msg_id(row.try_get("msg_id")?)
                .read_count(row.try_get("read_ct")?)
                .enqueued_at(row.try_get::<DateTime<Utc>, _>("enqueued_at")?)
                .visible_at(row.try_get::<DateTime<Utc>, _>("vt")?)
                .message(message)
                .build(),
        ))
    }

    async fn delete(&self, session: &mut PgConnection, queue: &str, msg_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM es_queue WHERE queue_name = $1 AND msg_id = $2")
            .bind(queue)
            .bind(msg_id)
            .execute(&mut *session)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
