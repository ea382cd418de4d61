//! 领域事件（Domain Event）
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`），以及随事件一同持久化的
//! 业务上下文（`EventContext`）。

mod domain_event_trait;
mod event_context;

pub use domain_event_trait::DomainEvent;
pub use event_context::EventContext;
