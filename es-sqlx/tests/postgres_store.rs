//! 需要可用的 PostgreSQL：设置 `DATABASE_URL=postgres://...` 后运行
//! `cargo test -p es-sqlx --features postgres`，未设置时测试直接跳过。
#![cfg(feature = "postgres")]

use es_domain::error::DomainError;
use es_domain::eventing::MessageQueue;
use es_domain::persist::{EventRepository, SerializedEvent, SerializedSnapshot, SnapshotRepository};
use es_sqlx::{DatabaseConfig, PgEventRepository, PgMessageQueue, PgSnapshotRepository, postgres};
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;

async fn pool() -> Option<PgPool> {
    let config = DatabaseConfig::from_env();
    if !config.url.starts_with("postgres") {
        return None;
    }
    let pool = config.connect_postgres().await.unwrap();
    let mut conn = pool.acquire().await.unwrap();
    postgres::migrate(&mut conn).await.unwrap();
    Some(pool)
}

fn event(aggregate_id: &str, version: usize) -> SerializedEvent {
    SerializedEvent::builder()
        .aggregate_id(aggregate_id.to_string())
        .tenant_id("T1".to_string())
        .aggregate_type("doc".to_string())
        .event_type("DOC_FIELD_SET_V1".to_string())
        .data(json!({ "name": "name", "value": version }))
        .metadata(json!({ "correlation_id": "c-1" }))
        .version(version)
        .build()
}

#[tokio::test]
async fn events_append_in_order_and_conflict_on_duplicates() {
    let Some(pool) = pool().await else { return };
    let repo = PgEventRepository::new();
    let id = format!("pg-{}", uuid::Uuid::new_v4());

    let mut tx = pool.begin().await.unwrap();
    assert_eq!(repo.last_version_for_update(&mut *tx, &id).await.unwrap(), 0);
    let stored = repo
        .append(&mut *tx, vec![event(&id, 1), event(&id, 2)])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert!(stored.iter().all(|e| e.id().is_some()));

    let mut conn = pool.acquire().await.unwrap();
    let loaded = repo.find_by_aggregate_id(&mut *conn, &id).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[1].metadata(), Some(&json!({ "correlation_id": "c-1" })));
    assert_eq!(repo.find_after_version(&mut *conn, &id, 1).await.unwrap().len(), 1);

    let err = repo.append(&mut *conn, vec![event(&id, 2)]).await.unwrap_err();
    assert!(matches!(err, DomainError::ConcurrencyConflict { expected: 1, .. }));
}

#[tokio::test]
async fn snapshot_upsert_overwrites() {
    let Some(pool) = pool().await else { return };
    let repo = PgSnapshotRepository::new();
    let id = format!("pg-{}", uuid::Uuid::new_v4());
    let mut conn = pool.acquire().await.unwrap();

    for version in [5, 10] {
        let snapshot = SerializedSnapshot::builder()
            .aggregate_id(id.clone())
            .tenant_id("T1".to_string())
            .aggregate_type("doc".to_string())
            .state(json!({ "v": version }))
            .version(version)
            .build();
        repo.upsert(&mut *conn, snapshot).await.unwrap();
    }

    let found = repo.find(&mut *conn, &id).await.unwrap().unwrap();
    assert_eq!(found.version(), 10);
    assert_eq!(found.state(), &json!({ "v": 10 }));
}

#[tokio::test]
async fn queue_claims_and_deletes() {
    let Some(pool) = pool().await else { return };
    let queue = PgMessageQueue::new();
    let name = format!("q-{}", uuid::Uuid::new_v4());
    let mut conn = pool.acquire().await.unwrap();

    let msg_id = queue.send(&mut *conn, &name, &json!({ "n": 1 })).await.unwrap();
    let claimed = queue
        .read(&mut *conn, &name, Duration::from_secs(30))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.msg_id(), msg_id);
    assert_eq!(claimed.read_count(), 1);
    assert!(
        queue
            .read(&mut *conn, &name, Duration::from_secs(30))
            .await
            .unwrap()
            .is_none()
    );
    assert!(queue.delete(&mut *conn, &name, msg_id).await.unwrap());
    assert!(!queue.delete(&mut *conn, &name, msg_id).await.unwrap());
}
