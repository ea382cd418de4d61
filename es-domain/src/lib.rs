//! 事件溯源领域层基础库（es-domain）
//!
//! 提供事件溯源的通用抽象与构件：
//! - 聚合（`aggregate`）与实体（`entity`）：未提交事件、版本与事件投影
//! - 领域事件（`domain_event`）：事件类型标签与业务上下文
//! - 持久化（`persist`）：事件/快照仓储协议、序列化、事件存储与快照策略
//! - 事件系统（`eventing`）：发布、可见性超时队列与轮询消费者
//!
//! 本 crate 与具体存储解耦：仓储、队列均以显式会话（事务/连接）为参数，
//! 由基础设施层（如 `es-sqlx`）提供实现；内置的内存实现用于测试与示例。
//!
//! 典型用法：
//! 1. 以 `#[event]` 定义事件枚举，以 `#[aggregate(event = ..)]` 定义聚合并实现 `Aggregate::when`；
//! 2. 组装 `EventStore::new(events, snapshots, QueueEventBus::new(queue))`；
//! 3. 命令处理：开启会话 → `load` → `apply_new` → `save` → 提交 → `clear_changes`；
//! 4. 以 `EventConsumer` 订阅聚合类型队列，驱动读模型更新。
//!
pub mod aggregate;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod eventing;
pub mod persist;

// 允许在本 crate 内部通过 ::es_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::es_domain 路径。
extern crate self as es_domain;
