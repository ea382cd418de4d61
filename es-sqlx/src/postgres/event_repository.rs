use super::{to_i64, to_usize};
use crate::{append_error, corrupt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use es_domain::error::DomainResult as Result;
use es_domain::persist::{EventRepository, SerializedEvent};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use tracing::debug;

const SELECT_EVENTS: &str = "SELECT id, aggregate_id, tenant_id, aggregate_type, event_type, \
     data, metadata, version, created_at FROM es_events";

#[derive(Debug, Default, Clone, Copy)]
pub struct PgEventRepository;

impl PgEventRepository {
    pub fn new() -> Self {
        Self
    }
}

fn event_from_row(row: &PgRow) -> Result<SerializedEvent> {
    let Json(data): Json<Value> = row.try_get("data")?;
    let metadata: Option<Json<Value>> = row.try_get("metadata")?;

    Ok(SerializedEvent::builder()
        .id(row.try_get::<i64, _>("id")?)
        .aggregate_id(row.try_get::<String, _>("aggregate_id")?)
        .tenant_id(row.try_get::<String, _>("tenant_id")?)
        .aggregate_type(row.try_get::<String, _>("aggregate_type")?)
        .event_type(row.try_get::<String, _>("event_type")?)
        .data(data)
        .maybe_metadata(metadata.map(|Json(v)| v))
        .version(to_usize(row.try_get("version")?)?)
        .created_at(row.try_get::<DateTime<Utc>, _>("created_at")?)
        .build())
}

#[async_trait]
impl EventRepository for PgEventRepository {
    type Session = PgConnection;

    async fn find_by_aggregate_id(
        &self,
        session: &mut PgConnection,
        aggregate_id: &str,
    ) -> Result<Vec<SerializedEvent>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE aggregate_id = $1 ORDER BY version"
        ))
        .bind(aggregate_id)
        .fetch_all(&mut *session)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn find_after_version(
        &self,
        session: &mut PgConnection,
        aggregate_id: &str,
        version: usize,
    ) -> Result<Vec<SerializedEvent>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE aggregate_id = $1 AND version > $2 ORDER BY version"
        ))
        .bind(aggregate_id)
        .bind(to_i64(version)?)
        .fetch_all(&mut *session)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn exists(&self, session: &mut PgConnection, aggregate_id: &str) -> Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM es_events WHERE aggregate_id = $1)")
                .bind(aggregate_id)
                .fetch_one(&mut *session)
                .await?;
        Ok(found)
    }

    /// 锁住当前最新版本行；聚合尚无事件时没有可锁的行
    ///
    /// 两个事务同时锁同一行时，后者在前者提交后重新取到的仍是被锁的那一行
    /// （旧的最大版本），版本检查因此通过，冲突改由追加时的唯一约束发现，
    /// 报告为 `actual: None`。新聚合的并发创建同理。
    async fn last_version_for_update(
        &self,
        session: &mut PgConnection,
        aggregate_id: &str,
    ) -> Result<usize> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM es_events WHERE aggregate_id = $1 \
             ORDER BY version DESC LIMIT 1 FOR UPDATE",
        )
        .bind(aggregate_id)
        .fetch_optional(&mut *session)
        .await?;
        to_usize(version.unwrap_or(0))
    }

    async fn append(
        &self,
        session: &mut PgConnection,
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
                Json(event.data().clone()),
                event.metadata().cloned().map(Json),
                to_i64(event.version())?,
                event.created_at(),
            ));
        }

        let mut builder = QueryBuilder::<Postgres>::new(
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
