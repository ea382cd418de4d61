use super::from_millis;
use async_trait::async_trait;
use chrono::Utc;
use es_domain::error::DomainResult as Result;
use es_domain::eventing::{MessageEnvelope, MessageQueue, effective_visibility_timeout};
use serde_json::Value;
use sqlx::{Row, SqliteConnection};
use std::time::Duration;

/// 基于 `es_queue` 表的可见性超时队列
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteMessageQueue;

impl SqliteMessageQueue {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageQueue for SqliteMessageQueue {
    type Session = SqliteConnection;

    async fn send(&self, session: &mut SqliteConnection, queue: &str, message: &Value) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        let msg_id: i64 = sqlx::query_scalar(
            "INSERT INTO es_queue (queue_name, read_ct, enqueued_at, vt, message) \
             VALUES (?, 0, ?, ?, ?) RETURNING msg_id",
        )
        .bind(queue)
        .bind(now)
        .bind(now)
        .bind(serde_json::to_string(message)?)
        .fetch_one(&mut *session)
        .await?;
        Ok(msg_id)
    }

    /// 单条 UPDATE 完成认领：选出最早的可见消息，推后其可见时间并累加读取次数
    async fn read(
        &self,
        session: &mut SqliteConnection,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<MessageEnvelope>> {
        let timeout = effective_visibility_timeout(visibility_timeout);
        let now = Utc::now().timestamp_millis();
        let hidden_until = now.saturating_add(i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX));

        let row = sqlx::query(
            r#"UPDATE es_queue SET vt = ?1, read_ct = read_ct + 1
               WHERE msg_id = (
                   SELECT msg_id FROM es_queue
                   WHERE queue_name = ?2 AND vt <= ?3
                   ORDER BY msg_id LIMIT 1
               )
               RETURNING msg_id, read_ct, enqueued_at, vt, message"#,
        )
        .bind(hidden_until)
        .bind(queue)
        .bind(now)
        .fetch_optional(&mut *session)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let message: String = row.try_get("message")?;
        Ok(Some(
            MessageEnvelope::builder()
                .msg_id(row.try_get("msg_id")?)
                .read_count(row.try_get("read_ct")?)
                .enqueued_at(from_millis(row.try_get("enqueued_at")?)?)
                .visible_at(from_millis(row.try_get("vt")?)?)
                .message(serde_json::from_str(&message)?)
                .build(),
        ))
    }

    async fn delete(&self, session: &mut SqliteConnection, queue: &str, msg_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM es_queue WHERE queue_name = ? AND msg_id = ?")
            .bind(queue)
            .bind(msg_id)
            .execute(&mut *session)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
