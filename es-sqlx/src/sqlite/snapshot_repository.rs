use super::{to_i64, to_usize};
use async_trait::async_trait;
use chrono::Utc;
use es_domain::error::DomainResult as Result;
use es_domain::persist::{SerializedSnapshot, SnapshotRepository};
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteSnapshotRepository;

impl SqliteSnapshotRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    type Session = SqliteConnection;

    async fn find(
        &self,
        session: &mut SqliteConnection,
        aggregate_id: &str,
    ) -> Result<Option<SerializedSnapshot>> {
        let row = sqlx::query(
            "SELECT aggregate_id, tenant_id, aggregate_type, state, version \
             FROM es_snapshots WHERE aggregate_id = ?",
        )
        .bind(aggregate_id)
        .fetch_optional(&mut *session)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state: String = row.try_get("state")?;
        Ok(Some(
            SerializedSnapshot::builder()
                .aggregate_id(row.try_get::<String, _>("aggregate_id")?)
                .tenant_id(row.try_get::<String, _>("tenant_id")?)
                .aggregate_type(row.try_get::<String, _>("aggregate_type")?)
                .state(serde_json::from_str(&state)?)
                .version(to_usize(row.try_get("version")?)?)
                .build(),
        ))
    }

    async fn upsert(&self, session: &mut SqliteConnection, snapshot: SerializedSnapshot) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO es_snapshots (aggregate_id, tenant_id, aggregate_type, state, version, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (aggregate_id) DO UPDATE SET
                   tenant_id = excluded.tenant_id,
                   aggregate_type = excluded.aggregate_type,
                   state = excluded.state,
                   version = excluded.version,
                   updated_at = excluded.updated_at"#,
        )
        .bind(snapshot.aggregate_id())
        .bind(snapshot.tenant_id())
        .bind(snapshot.aggregate_type())
        .bind(serde_json::to_string(snapshot.state())?)
        .bind(to_i64(snapshot.version())?)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *session)
        .await?;
        Ok(())
    }
}
