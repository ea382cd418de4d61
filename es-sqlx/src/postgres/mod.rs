//! PostgreSQL 后端
//!
//! JSON 以 JSONB 存储，时间为 TIMESTAMPTZ。`last_version_for_update` 以
//! `FOR UPDATE` 锁定最新事件行；队列读取使用 `FOR UPDATE SKIP LOCKED`，
//! 多个消费者可并发认领而互不阻塞。
//!
mod event_repository;
mod message_queue;
mod snapshot_repository;

pub use event_repository::PgEventRepository;
pub use message_queue::PgMessageQueue;
pub use snapshot_repository::PgSnapshotRepository;

use crate::corrupt;
use es_domain::error::DomainResult as Result;
use sqlx::PgConnection;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS es_events (
        id             BIGSERIAL   PRIMARY KEY,
        aggregate_id   TEXT        NOT NULL,
        tenant_id      TEXT        NOT NULL,
        aggregate_type TEXT        NOT NULL,
        event_type     TEXT        NOT NULL,
        data           JSONB       NOT NULL,
        metadata       JSONB,
        version        BIGINT      NOT NULL,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT es_events_aggregate_version_key UNIQUE (aggregate_id, version)
    )"#,
    "CREATE INDEX IF NOT EXISTS es_events_aggregate_id_idx ON es_events (aggregate_id)",
    r#"CREATE TABLE IF NOT EXISTS es_snapshots (
        aggregate_id   TEXT        PRIMARY KEY,
        tenant_id      TEXT        NOT NULL,
        aggregate_type TEXT        NOT NULL,
        state          JSONB       NOT NULL,
        version        BIGINT      NOT NULL,
        updated_at     TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS es_queue (
        msg_id      BIGSERIAL   PRIMARY KEY,
        queue_name  TEXT        NOT NULL,
        read_ct     BIGINT      NOT NULL DEFAULT 0,
        enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        vt          TIMESTAMPTZ NOT NULL DEFAULT now(),
        message     JSONB       NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS es_queue_visible_idx ON es_queue (queue_name, vt)",
];

/// 建表（幂等）
pub async fn migrate(conn: &mut PgConnection) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(&mut *conn).await?;
    }
    Ok(())
}

pub(crate) fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| corrupt(format!("version out of range: {value}")))
}

pub(crate) fn to_usize(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| corrupt(format!("negative version: {value}")))
}
