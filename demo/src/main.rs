//! 内容编辑演示：SQLite 事件存储 + 队列消费者维护读模型
//!
//! ```text
//! DATABASE_URL=sqlite://demo.db RUST_LOG=info cargo run -p demo
//! ```
use anyhow::Context;
use es_application::command_handler::CommandHandler;
use es_application::content::{
    AddContentFieldComment, ContentCommandHandler, ContentEventHandler,
    ContentProjectionRepository, CreateContent, InMemoryContentProjectionRepository,
    UpdateContentField,
};
use es_application::context::AppContext;
use es_domain::domain_event::EventContext;
use es_domain::eventing::{ConsumerConfig, EventConsumer, QueueEventBus};
use es_domain::persist::EventStore;
use es_sqlx::{
    DatabaseConfig, PoolSessions, SqliteEventRepository, SqliteMessageQueue,
    SqliteSnapshotRepository, sqlite,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = DatabaseConfig::from_env();
    let pool = config
        .connect_sqlite()
        .await
        .with_context(|| format!("connect {}", config.url))?;
    sqlite::migrate(&mut *pool.acquire().await?).await?;

    let commands = ContentCommandHandler::new(EventStore::new(
        SqliteEventRepository::new(),
        SqliteSnapshotRepository::new(),
        QueueEventBus::new(SqliteMessageQueue::new()),
    ));

    let projections = InMemoryContentProjectionRepository::new();
    let consumer = EventConsumer::builder()
        .sessions(PoolSessions::new(pool.clone()))
        .queue(SqliteMessageQueue::new())
        .handler(Arc::new(ContentEventHandler::new(projections.clone())))
        .config(ConsumerConfig {
            poll_interval: Duration::from_millis(50),
            ..ConsumerConfig::default()
        })
        .build()
        .start();

    let id = ulid::Ulid::new().to_string();
    let tenant = "demo".to_string();
    let ctx = AppContext {
        biz: EventContext::builder()
            .correlation_id(ulid::Ulid::new().to_string())
            .actor_type("user".into())
            .actor_id("u-1".into())
            .build(),
        idempotency_key: None,
    };

    // 创建
    let mut tx = pool.begin().await?;
    commands
        .handle(
            &mut *tx,
            &ctx,
            CreateContent {
                aggregate_id: id.clone(),
                tenant_id: tenant.clone(),
                content_type: "article".to_string(),
                content: json!({ "title": "draft", "body": "..." }).as_object().cloned(),
            },
        )
        .await?;
    tx.commit().await?;

    // 修改标题
    let mut tx = pool.begin().await?;
    commands
        .handle(
            &mut *tx,
            &ctx,
            UpdateContentField {
                aggregate_id: id.clone(),
                tenant_id: tenant.clone(),
                field_name: "title".to_string(),
                before_value: json!("draft"),
                after_value: json!("Event sourcing in practice"),
                created_by_id: "u-1".to_string(),
                created_by_name: "editor".to_string(),
            },
        )
        .await?;
    tx.commit().await?;

    // 评论
    let mut tx = pool.begin().await?;
    commands
        .handle(
            &mut *tx,
            &ctx,
            AddContentFieldComment {
                aggregate_id: id.clone(),
                tenant_id: tenant.clone(),
                field_name: "body".to_string(),
                comment: "needs an introduction".to_string(),
                created_by_id: "u-2".to_string(),
                created_by_name: "reviewer".to_string(),
            },
        )
        .await?;
    tx.commit().await?;

    // 等待读模型追上写模型
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let projection = loop {
        if let Some(p) = projections.find(&tenant, &id).await? {
            if p.version == 3 {
                break p;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("projection did not catch up");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    consumer.shutdown();
    consumer.join().await;

    info!(aggregate_id = %id, version = projection.version, "projection ready");
    println!("{}", serde_json::to_string_pretty(&projection)?);
    Ok(())
}
