use super::{to_i64, to_usize};
use async_trait::async_trait;
use es_domain::error::DomainResult as Result;
use es_domain::persist::{SerializedSnapshot, SnapshotRepository};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgConnection, Row};

#[derive(Debug, Default, Clone, Copy)]
pub struct PgSnapshotRepository;

impl PgSnapshotRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    type Session = PgConnection;

    async fn find(
        &self,
        session: &mut PgConnection,
        aggregate_id: &str,
    ) -> Result<Option<SerializedSnapshot>> {
        let row = sqlx::query(
            "SELECT aggregate_id, tenant_id, aggregate_type, state, version \
             FROM es_snapshots WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_optional(&mut *session)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Json(state): Json<Value> = row.try_get("state")?;
        Ok(Some(
            SerializedSnapshot::builder()
                .aggregate_id(row.try_get::<String, _>("aggregate_id")?)
                .tenant_id(row.try_get::<String, _>("tenant_id")?)
                .aggregate_type(row.try_get::<String, _>("aggregate_type")?)
                .state(state)
                .version(to_usize(row.try_get("version")?)?)
                .build(),
        ))
    }

    async fn upsert(&self, session: &mut PgConnection, snapshot: SerializedSnapshot) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO es_snapshots (aggregate_id, tenant_id, aggregate_type, state, version, updated_at)
               VALUES ($1, $2, $3, $4, $5, now())
               ON CONFLICT (aggregate_id) DO UPDATE SET
                   tenant_id = EXCLUDED.tenant_id,
                   aggregate_type = EXCLUDED.aggregate_type,
                   state = EXCLUDED.state,
                   version = EXCLUDED.version,
                   updated_at = now()"#,
        )
        .bind(snapshot.aggregate_id())
        .bind(snapshot.tenant_id())
        .bind(snapshot.aggregate_type())
        .bind(Json(snapshot.state()))
        .bind(to_i64(snapshot.version())?)
        .execute(&mut *session)
        .await?;
        Ok(())
    }
}
