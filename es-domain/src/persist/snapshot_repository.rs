//! 快照仓储协议与策略
//!
//! 定义聚合快照读写接口与落盘策略（按版本间隔）。
//!
use crate::{error::DomainResult as Result, persist::SerializedSnapshot};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    type Session: Send;

    async fn find(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
    ) -> Result<Option<SerializedSnapshot>>;

    /// 按 aggregate_id 覆盖写入
    async fn upsert(&self, session: &mut Self::Session, snapshot: SerializedSnapshot)
    -> Result<()>;
}

#[async_trait]
impl<T> SnapshotRepository for Arc<T>
where
    T: SnapshotRepository + ?Sized,
{
    type Session = T::Session;

    async fn find(
        &self,
        session: &mut Self::Session,
        aggregate_id: &str,
    ) -> Result<Option<SerializedSnapshot>> {
        (**self).find(session, aggregate_id).await
    }

    async fn upsert(
        &self,
        session: &mut Self::Session,
        snapshot: SerializedSnapshot,
    ) -> Result<()> {
        (**self).upsert(session, snapshot).await
    }
}

/// 快照策略：版本恰为间隔整数倍时落盘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    Never,
    Every(usize),
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        SnapshotPolicy::Every(5)
    }
}

impl SnapshotPolicy {
    pub fn should_snapshot(&self, version: usize) -> bool {
        match self {
            SnapshotPolicy::Never => false,
            SnapshotPolicy::Every(interval) => {
                let interval = (*interval).max(1);
                version > 0 && version.is_multiple_of(interval)
            }
        }
    }
}
