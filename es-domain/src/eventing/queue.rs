//! 可见性超时消息队列协议
//!
//! 语义与 pgmq 一致：`read` 原子地认领一条当前可见的消息，并将其隐藏至
//! `now + visibility_timeout`；未在超时前 `delete` 的消息会被再次投递（至少一次）。
//!
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// 未指定（为零）时使用的可见性超时
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// 零值可见性超时归一为默认值
pub fn effective_visibility_timeout(visibility_timeout: Duration) -> Duration {
    if visibility_timeout.is_zero() {
        DEFAULT_VISIBILITY_TIMEOUT
    } else {
        visibility_timeout
    }
}

/// 队列中的一条消息
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// 队列分配的消息 ID（与事件 ID 无关）
    msg_id: i64,
    /// 已被读取的次数（含本次）
    read_count: i64,
    enqueued_at: DateTime<Utc>,
    /// 在此时间之前对其他读取者不可见
    visible_at: DateTime<Utc>,
    message: Value,
}

impl MessageEnvelope {
    pub fn msg_id(&self) -> i64 {
        self.msg_id
    }

    pub fn read_count(&self) -> i64 {
        self.read_count
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn visible_at(&self) -> DateTime<Utc> {
        self.visible_at
    }

    pub fn message(&self) -> &Value {
        &self.message
    }
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    type Session: Send;

    /// 入队，返回消息 ID
    async fn send(&self, session: &mut Self::Session, queue: &str, message: &Value)
    -> Result<i64>;

    /// 认领至多一条可见消息；队列为空或全部隐藏时返回 `None`
    async fn read(
        &self,
        session: &mut Self::Session,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<MessageEnvelope>>;

    /// 永久删除消息，返回是否确有删除（重复删除返回 false）
    async fn delete(&self, session: &mut Self::Session, queue: &str, msg_id: i64) -> Result<bool>;
}

#[async_trait]
impl<T> MessageQueue for Arc<T>
where
    T: MessageQueue + ?Sized,
{
    type Session = T::Session;

    async fn send(
        &self,
        session: &mut Self::Session,
        queue: &str,
        message: &Value,
    ) -> Result<i64> {
        (**self).send(session, queue, message).await
    }

    async fn read(
        &self,
        session: &mut Self::Session,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<MessageEnvelope>> {
        (**self).read(session, queue, visibility_timeout).await
    }

    async fn delete(&self, session: &mut Self::Session, queue: &str, msg_id: i64) -> Result<bool> {
        (**self).delete(session, queue, msg_id).await
    }
}
