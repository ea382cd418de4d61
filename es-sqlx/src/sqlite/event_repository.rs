use super::{from_millis, to_i64, to_usize};
use crate::{append_error, corrupt};
use async_trait::async_trait;
use es_domain::error::DomainResult as Result;
use es_domain::persist::{EventRepository, SerializedEvent};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::HashMap;
use tracing::debug;

const SELECT_EVENTS: &str = "SELECT id, aggregate_id, tenant_id, aggregate_type, event_type, \
     data, metadata, version, created_at FROM es_events";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteEventRepository;

impl SqliteEventRepository {
    pub fn new() -> Self {
        Self
    }
}

fn event_from_row(row: &SqliteRow) -> Result<SerializedEvent> {
    let data: String = row.try_get("data")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(SerializedEvent::builder()
        .id(row.try_get::<i64, _>("id")?)
        .aggregate_id(row.try_get::<String, _>("aggregate_id")?)
        .tenant_id(row.try_get::<String, _>("tenant_id")?)
        .aggregate_type(row.try_get::<String, _>("aggregate_type")?)
        .event_type(row.try_get::<String, _>("event_type")?)
        .data(serde_json::from_str(&data)?)
        .maybe_metadata(metadata.as_deref().map(serde_json::from_str).transpose()?)
        .version(to_usize(row.try_get("version")?)?)
        .created_at(from_millis(row.try_get("created_at")?)?)
        .build())
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    type Session = SqliteConnection;

    async fn find_by_aggregate_id(
        &self,
        session: &mut SqliteConnection,
        aggregate_id: &str,
    ) -> Result<Vec<SerializedEvent>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE aggregate_id = ? ORDER BY version"
        ))
        .bind(aggregate_id)
        .fetch_all(&mut *session)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn find_after_version(
        &self,
        session: &mut SqliteConnection,
        aggregate_id: &str,
        version: usize,
    ) -> Result<Vec<SerializedEvent>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE aggregate_id = ? AND version > ? ORDER BY version"
        ))
        .bind(aggregate_id)
        .bind(to_i64(version)?)
        .fetch_all(&mut *session)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn exists(&self, session: &mut SqliteConnection, aggregate_id: &str) -> Result<bool> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM es_events WHERE aggregate_id = ?)")
                .bind(aggregate_id)
                .fetch_one(&mut *session)
                .await?;
        Ok(found != 0)
    }

    /// SQLite 无 `FOR UPDATE`：写锁在事务首次写入时获取
    ///
    /// 读到的版本可能在追加前被另一事务推进，此时追加因唯一约束或
    /// `SQLITE_BUSY_SNAPSHOT` 失败，并以 `actual: None` 报告并发冲突。
    async fn last_version_for_update(
        &self,
        session: &mut SqliteConnection,
        aggregate_id: &str,
    ) -> Result<usize> {
        let version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) FROM es_events WHERE aggregate_id = ?",
        )
        .bind(aggregate_id)
        .fetch_one(&mut *session)
        .await?;
        to_usize(version)
    }

    async fn append(
        &self,
        session: &mut SqliteConnection,
        events: Vec<SerializedEvent>,
    ) -> Result<Vec<SerializedEvent>> {
        let Some(first) = events.first() else {
            return Ok(events);
        };
        let aggregate_id = first.aggregate_id().to_string();
        let expected = first.version().saturating_sub(1);

        let mut rows = Vec::with_capacity(events.len());
        for event in &events {
            rows.push((
                event.aggregate_id().to_string(),
                event.tenant_id().to_string(),
                event.aggregate_type().to_string(),
                event.event_type().to_string(),
                serde_json::to_string(event.data())?,
                event.metadata().map(serde_json::to_string).transpose()?,
                to_i64(event.version())?,
                event.created_at().timestamp_millis(),
            ));
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO es_events (aggregate_id, tenant_id, aggregate_type, event_type, \
             data, metadata, version, created_at) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.0)
                .push_bind(row.1)
                .push_bind(row.2)
                .push_bind(row.3)
                .push_bind(row.4)
                .push_bind(row.5)
                .push_bind(row.6)
                .push_bind(row.7);
        });
        builder.push(" RETURNING id, version");

        let returned = builder
            .build()
            .fetch_all(&mut *session)
            .await
            .map_err(|e| append_error(e, &aggregate_id, expected))?;

        let mut ids = HashMap::with_capacity(returned.len());
        for row in &returned {
            ids.insert(row.try_get::<i64, _>("version")?, row.try_get::<i64, _>("id")?);
        }

        debug!(aggregate_id = %aggregate_id, count = events.len(), "events appended");

        events
            .into_iter()
            .map(|event| {
                let version = to_i64(event.version())?;
                let id = ids
                    .get(&version)
                    .copied()
                    .ok_or_else(|| corrupt(format!("no id returned for version {version}")))?;
                Ok(event.with_id(id))
            })
            .collect()
    }
}
