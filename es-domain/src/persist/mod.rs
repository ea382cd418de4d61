//! 持久化与事件溯源（persist）
//!
//! 定义事件仓储、快照仓储与会话协议，以及在其上组合的事件存储：
//! - 事件记录与快照的持久化形态（`SerializedEvent`/`SerializedSnapshot`）；
//! - 事件序列化（`serialize_event`/`deserialize_event`）；
//! - 事件追加与按聚合查询（`EventRepository`）；
//! - 快照读写与策略（`SnapshotRepository`/`SnapshotPolicy`）；
//! - 加载/保存/存在性判断（`AggregateStore`/`EventStore`）。
//!
//! 具体存储后端（如 SQLite、Postgres）由上层提供实现并注入。
//!
mod event_repository;
mod event_store;
mod inmemory;
mod serialized_event;
mod serialized_snapshot;
mod serializer;
mod session;
mod snapshot_repository;

pub use event_repository::EventRepository;
pub use event_store::{AggregateStore, EventStore};
pub use inmemory::{InMemoryEventRepository, InMemorySnapshotRepository};
pub use serialized_event::SerializedEvent;
pub use serialized_snapshot::SerializedSnapshot;
pub use serializer::{deserialize_event, event_context, serialize_event};
pub use session::SessionProvider;
pub use snapshot_repository::{SnapshotPolicy, SnapshotRepository};
