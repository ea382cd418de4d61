//! 聚合（Aggregate）抽象
//!
//! 约束一个事件溯源聚合的核心行为：
//! - `when` 将单个事件投影到状态上，拒绝时返回聚合自身的错误；
//! - `apply_new` 产生新事件：投影成功后记入未提交事件并推进版本；
//! - `replay` 重建历史：投影并推进版本，不记入未提交事件；
//! - 未提交事件只由调用方在保存成功后清理（`clear_changes`）。
//!
use crate::domain_event::DomainEvent;
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use serde::{Serialize, de::DeserializeOwned};
use std::error::Error;

/// 未提交事件与版本的底层存取，通常由 `#[aggregate]` 宏生成
pub trait EventSourced: Entity {
    /// 该聚合产生的领域事件类型
    type Event: DomainEvent;

    /// 尚未持久化的事件（按产生顺序）
    fn changes(&self) -> &[Self::Event];

    fn clear_changes(&mut self);

    #[doc(hidden)]
    fn record_change(&mut self, event: Self::Event);

    #[doc(hidden)]
    fn set_version(&mut self, version: usize);
}

/// 聚合根接口
pub trait Aggregate: EventSourced + Default + Serialize + DeserializeOwned + Send + Sync {
    /// 聚合类型，同时作为事件队列的主题名
    const TYPE: &'static str;

    /// 领域规则错误
    type Error: Error + Send + Sync + 'static;

    /// 将事件投影到当前状态。
    ///
    /// 必须是 (旧状态, 事件) 的纯函数；拒绝事件时应在修改任何字段之前返回错误。
    fn when(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// 应用一个新事件：投影 → 记入未提交事件 → 版本 +1
    ///
    /// 投影失败时返回 `DomainRuleViolation`，不记录事件、不推进版本。
    fn apply_new(&mut self, event: Self::Event) -> DomainResult<()> {
        self.when(&event).map_err(DomainError::rule_violation)?;
        self.record_change(event);
        self.set_version(self.version() + 1);
        Ok(())
    }

    /// 重放一个历史事件：投影 → 版本 +1
    fn replay(&mut self, event: &Self::Event) -> DomainResult<()> {
        self.when(event).map_err(DomainError::rule_violation)?;
        self.set_version(self.version() + 1);
        Ok(())
    }

    /// 加载时的版本，即最后一次持久化后的版本
    fn loaded_version(&self) -> usize {
        self.version().saturating_sub(self.changes().len())
    }
}
