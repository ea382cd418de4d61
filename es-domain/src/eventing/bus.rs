//! 事件总线（EventBus）协议
//!
//! 保存成功后，事件存储在同一会话内将新事件交给总线；`QueueEventBus` 以聚合类型
//! 为主题名，把事件记录写入持久化消息队列。
//!
use crate::{
    error::DomainResult as Result,
    eventing::MessageQueue,
    persist::SerializedEvent,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// 事件总线：负责分发已存储的事件
#[async_trait]
pub trait EventBus: Send + Sync {
    type Session: Send;

    async fn publish(&self, session: &mut Self::Session, event: &SerializedEvent) -> Result<()>;

    async fn publish_batch(
        &self,
        session: &mut Self::Session,
        events: &[SerializedEvent],
    ) -> Result<()> {
        for event in events {
            self.publish(session, event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> EventBus for Arc<T>
where
    T: EventBus + ?Sized,
{
    type Session = T::Session;

    async fn publish(&self, session: &mut Self::Session, event: &SerializedEvent) -> Result<()> {
        (**self).publish(session, event).await
    }

    async fn publish_batch(
        &self,
        session: &mut Self::Session,
        events: &[SerializedEvent],
    ) -> Result<()> {
        (**self).publish_batch(session, events).await
    }
}

/// 基于消息队列的事件总线：主题 = 聚合类型，消息 = 事件记录 JSON
#[derive(Clone)]
pub struct QueueEventBus<Q> {
    queue: Q,
}

impl<Q> QueueEventBus<Q>
where
    Q: MessageQueue,
{
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }
}

#[async_trait]
impl<Q> EventBus for QueueEventBus<Q>
where
    Q: MessageQueue,
{
    type Session = Q::Session;

    async fn publish(&self, session: &mut Self::Session, event: &SerializedEvent) -> Result<()> {
        let payload = serde_json::to_value(event)?;
        let msg_id = self
            .queue
            .send(session, event.aggregate_type(), &payload)
            .await?;

        debug!(
            queue = event.aggregate_type(),
            msg_id,
            aggregate_id = event.aggregate_id(),
            version = event.version(),
            "event published"
        );
        Ok(())
    }
}
