//! 事件仓储协议
//!
//! 所有操作显式接收调用方持有的会话（事务/连接），仓储自身从不开启新的事务。
//!
use crate::{error::DomainResult as Result, persist::SerializedEvent};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// 会话类型，例如 `SqliteConnection`；内存实现为 `()`
    type Session: Send;

    /// 按版本升序返回聚合的全部事件
    async fn find_by_aggregate_id(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
    ) -> Result<Vec<SerializedEvent>>;

    /// 按版本升序返回 `version` 之后（不含）的事件
    async fn find_after_version(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
        version: usize,
    ) -> Result<Vec<SerializedEvent>>;

    async fn exists(&self, session: &mut Self::Session, aggregate_id: &str) -> Result<bool>;

    /// 读取已持久化的最新版本（无事件为 0），并在会话内锁定该行直至事务结束
    async fn last_version_for_update(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
    ) -> Result<usize>;

    /// 整批追加事件：要么全部写入要么全部失败。
    ///
    /// (aggregate_id, version) 冲突时返回 `ConcurrencyConflict`。
    /// 返回回填了存储层 ID 的事件。
    async fn append(
        &self,
        session: &mut Self::Session,
        events: Vec<SerializedEvent>,
    ) -> Result<Vec<SerializedEvent>>;
}

#[async_trait]
impl<T> EventRepository for Arc<T>
where
    T: EventRepository + ?Sized,
{
    type Session = T::Session;

    async fn find_by_aggregate_id(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
    ) -> Result<Vec<SerializedEvent>> {
        (**self).find_by_aggregate_id(session, aggregate_id).await
    }

    async fn find_after_version(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
        version: usize,
    ) -> Result<Vec<SerializedEvent>> {
        (**self)
            .find_after_version(session, aggregate_id, version)
            .await
    }

    async fn exists(&self, session: &mut Self::Session, aggregate_id: &str) -> Result<bool> {
        (**self).exists(session, aggregate_id).await
    }

    async fn last_version_for_update(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
    ) -> Result<usize> {
        (**self).last_version_for_update(session, aggregate_id).await
    }

    async fn append(
        &self,
        session: &mut Self::Session,
        events: Vec<SerializedEvent>,
    ) -> Result<Vec<SerializedEvent>> {
        (**self).append(session, events).await
    }
}
