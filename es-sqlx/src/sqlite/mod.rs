//! SQLite 后端
//!
//! JSON 以 TEXT 存储，时间以 Unix 毫秒（INTEGER）存储。
//! SQLite 没有行级锁，写事务在首次写入时获取数据库写锁；
//! 并发写入者先在 busy_timeout 内等待写锁；读快照已过期（`SQLITE_BUSY_SNAPSHOT`）
//! 或等待超时的追加被报告为并发冲突。
//!
mod event_repository;
mod message_queue;
mod snapshot_repository;

pub use event_repository::SqliteEventRepository;
pub use message_queue::SqliteMessageQueue;
pub use snapshot_repository::SqliteSnapshotRepository;

use crate::corrupt;
use chrono::{DateTime, Utc};
use es_domain::error::DomainResult as Result;
use sqlx::SqliteConnection;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS es_events (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        aggregate_id   TEXT    NOT NULL,
        tenant_id      TEXT    NOT NULL,
        aggregate_type TEXT    NOT NULL,
        event_type     TEXT    NOT NULL,
        data           TEXT    NOT NULL,
        metadata       TEXT,
        version        INTEGER NOT NULL,
        created_at     INTEGER NOT NULL,
        UNIQUE (aggregate_id, version)
    )"#,
    "CREATE INDEX IF NOT EXISTS es_events_aggregate_id_idx ON es_events (aggregate_id)",
    r#"CREATE TABLE IF NOT EXISTS es_snapshots (
        aggregate_id   TEXT    PRIMARY KEY,
        tenant_id      TEXT    NOT NULL,
        aggregate_type TEXT    NOT NULL,
        state          TEXT    NOT NULL,
        version        INTEGER NOT NULL,
        updated_at     INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS es_queue (
        msg_id      INTEGER PRIMARY KEY AUTOINCREMENT,
        queue_name  TEXT    NOT NULL,
        read_ct     INTEGER NOT NULL DEFAULT 0,
        enqueued_at INTEGER NOT NULL,
        vt          INTEGER NOT NULL,
        message     TEXT    NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS es_queue_visible_idx ON es_queue (queue_name, vt)",
];

/// 建表（幂等）
pub async fn migrate(conn: &mut SqliteConnection) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(&mut *conn).await?;
    }
    Ok(())
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| corrupt(format!("timestamp out of range: {ms}")))
}

pub(crate) fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| corrupt(format!("version out of range: {value}")))
}

pub(crate) fn to_usize(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| corrupt(format!("negative version: {value}")))
}
