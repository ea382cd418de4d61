//! 事件存储（EventStore）
//!
//! 组合事件仓储、快照仓储与事件总线，实现聚合的加载、保存与存在性判断：
//! - `load`：快照（如有）→ 快照之后的事件按版本升序重放；
//! - `save`：序列化未提交事件 → 版本比较 → 整批追加 → 按策略写快照 → 发布；
//! - 全部步骤在调用方传入的同一会话（事务）内执行。
//!
use crate::{
    aggregate::{Aggregate, EventSourced},
    domain_event::{DomainEvent, EventContext},
    entity::Entity,
    error::{DomainError, DomainResult as Result},
    eventing::EventBus,
    persist::{
        EventRepository, SerializedEvent, SerializedSnapshot, SnapshotPolicy, SnapshotRepository,
        deserialize_event, serialize_event,
    },
};
use async_trait::async_trait;
use tracing::{debug, warn};

/// 命令处理器使用的聚合存储接口
#[async_trait]
pub trait AggregateStore: Send + Sync {
    type Session: Send;

    /// 以 `aggregate.id()` 加载历史并重建状态；无历史时保持空白状态（版本 0）
    async fn load<A: Aggregate>(&self, session: &mut Self::Session, aggregate: &mut A)
    -> Result<()>;

    /// 持久化未提交事件并发布，返回已存储的事件。
    ///
    /// 不清理聚合的未提交事件，调用方在会话提交后自行 `clear_changes`。
    async fn save<A: Aggregate>(
        &self,
        session: &mut Self::Session,
        aggregate: &A,
    ) -> Result<Vec<SerializedEvent>> {
        self.save_with_context(session, aggregate, None).await
    }

    /// 同 `save`，并将业务上下文写入每个事件的 metadata
    async fn save_with_context<A: Aggregate>(
        &self,
        session: &mut Self::Session,
        aggregate: &A,
        context: Option<&EventContext>,
    ) -> Result<Vec<SerializedEvent>>;

    async fn exists(&self, session: &mut Self::Session, aggregate_id: &str) -> Result<bool>;
}

pub struct EventStore<E, S, B> {
    events: E,
    snapshots: S,
    bus: B,
    policy: SnapshotPolicy,
}

impl<E, S, B> EventStore<E, S, B>
where
    E: EventRepository,
    S: SnapshotRepository<Session = E::Session>,
    B: EventBus<Session = E::Session>,
{
    pub fn new(events: E, snapshots: S, bus: B) -> Self {
        Self {
            events,
            snapshots,
            bus,
            policy: SnapshotPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    fn decode<A: Aggregate>(stored: &SerializedEvent) -> Result<A::Event> {
        let unknown = || DomainError::UnknownEventType {
            aggregate_type: stored.aggregate_type().to_string(),
            event_type: stored.event_type().to_string(),
        };

        if stored.aggregate_type() != A::TYPE
            || <A::Event as DomainEvent>::variant_of(stored.event_type()).is_none()
        {
            return Err(unknown());
        }

        deserialize_event::<A::Event>(stored)
    }
}

#[async_trait]
impl<E, S, B> AggregateStore for EventStore<E, S, B>
where
    E: EventRepository,
    S: SnapshotRepository<Session = E::Session>,
    B: EventBus<Session = E::Session>,
{
    type Session = E::Session;

    async fn load<A: Aggregate>(
        &self,
        session: &mut Self::Session,
        aggregate: &mut A,
    ) -> Result<()> {
        let aggregate_id = aggregate.id().to_string();

        let history = match self.snapshots.find(session, &aggregate_id).await? {
            Some(snapshot) => {
                let version = snapshot.version();
                *aggregate = snapshot.to_aggregate::<A>()?;
                debug!(aggregate_id = %aggregate_id, version, "aggregate restored from snapshot");
                self.events
                    .find_after_version(session, &aggregate_id, version)
                    .await?
            }
            None => {
                self.events
                    .find_by_aggregate_id(session, &aggregate_id)
                    .await?
            }
        };

        for stored in &history {
            let event = Self::decode::<A>(stored)?;
            aggregate.replay(&event)?;
        }

        debug!(
            aggregate_id = %aggregate_id,
            replayed = history.len(),
            version = aggregate.version(),
            "aggregate loaded"
        );
        Ok(())
    }

    async fn save_with_context<A: Aggregate>(
        &self,
        session: &mut Self::Session,
        aggregate: &A,
        context: Option<&EventContext>,
    ) -> Result<Vec<SerializedEvent>> {
        let changes = aggregate.changes();
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let expected = aggregate.loaded_version();
        let records = changes
            .iter()
            .enumerate()
            .map(|(offset, event)| serialize_event(aggregate, event, expected + offset + 1, context))
            .collect::<Result<Vec<_>>>()?;

        let actual = self
            .events
            .last_version_for_update(session, aggregate.id())
            .await?;
        if actual != expected {
            warn!(
                aggregate_id = %aggregate.id(),
                expected,
                actual,
                "concurrency conflict detected before append"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate.id().to_string(),
                expected,
                actual: Some(actual),
            });
        }

        let stored = self.events.append(session, records).await?;

        if self.policy.should_snapshot(aggregate.version()) {
            let snapshot = SerializedSnapshot::from_aggregate(aggregate)?;
            self.snapshots.upsert(session, snapshot).await?;
            debug!(aggregate_id = %aggregate.id(), version = aggregate.version(), "snapshot written");
        }

        self.bus.publish_batch(session, &stored).await?;

        debug!(
            aggregate_id = %aggregate.id(),
            aggregate_type = A::TYPE,
            events = stored.len(),
            version = aggregate.version(),
            "aggregate saved"
        );
        Ok(stored)
    }

    async fn exists(&self, session: &mut Self::Session, aggregate_id: &str) -> Result<bool> {
        self.events.exists(session, aggregate_id).await
    }
}
