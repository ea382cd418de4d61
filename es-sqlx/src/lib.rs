//! 基于 sqlx 的事件溯源基础设施（es-sqlx）
//!
//! 为 `es-domain` 的仓储与队列协议提供关系型实现：
//! - SQLite（默认特性 `sqlite`）：`SqliteEventRepository`、`SqliteSnapshotRepository`、`SqliteMessageQueue`；
//! - PostgreSQL（特性 `postgres`）：`PgEventRepository`、`PgSnapshotRepository`、`PgMessageQueue`；
//! - 建表（`sqlite::migrate`/`postgres::migrate`）、连接配置（`DatabaseConfig`）与连接池会话（`PoolSessions`）。
//!
//! 事务由调用方开启（`pool.begin()`），以 `&mut *tx` 逐层传入；任何错误返回后丢弃事务即回滚。
//!
pub mod config;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::DatabaseConfig;
pub use session::PoolSessions;

#[cfg(feature = "postgres")]
pub use postgres::{PgEventRepository, PgMessageQueue, PgSnapshotRepository};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteEventRepository, SqliteMessageQueue, SqliteSnapshotRepository};

use es_domain::error::DomainError;

/// 追加事件时的写冲突视为并发冲突，其余错误原样转换
///
/// 唯一约束冲突说明同一版本已被他人写入；SQLite 的写锁竞争同样意味着
/// 另一个事务正在或已经写入，本事务读到的版本不再可信。
pub(crate) fn append_error(err: sqlx::Error, aggregate_id: &str, expected: usize) -> DomainError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() || is_write_contention(&**db) => {
            DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.to_string(),
                expected,
                actual: None,
            }
        }
        _ => err.into(),
    }
}

/// SQLITE_BUSY(5) 与 WAL 下读快照过期的 SQLITE_BUSY_SNAPSHOT(517)
#[cfg(feature = "sqlite")]
fn is_write_contention(db: &dyn sqlx::error::DatabaseError) -> bool {
    db.try_downcast_ref::<sqlx::sqlite::SqliteError>().is_some()
        && matches!(db.code().as_deref(), Some("5" | "517"))
}

#[cfg(not(feature = "sqlite"))]
fn is_write_contention(_db: &dyn sqlx::error::DatabaseError) -> bool {
    false
}

pub(crate) fn corrupt(reason: impl Into<String>) -> DomainError {
    DomainError::database(reason)
}
