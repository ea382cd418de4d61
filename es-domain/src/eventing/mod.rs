//! 事件子系统（eventing）
//!
//! 提供事件发布与异步消费的基础抽象与运行时：
//! - `EventBus`：保存成功后在同一会话内发布事件；`QueueEventBus` 写入消息队列；
//! - `MessageQueue`：可见性超时队列（认领/删除语义，至少一次投递）；
//! - `EventHandler`：按聚合类型消费事件；
//! - `EventConsumer`：轮询 + 处理两个可取消任务，成功后删除消息。
//!
pub mod bus;
#[cfg(feature = "eventing")]
pub mod consumer;
pub mod handler;
pub mod queue;
pub mod queue_inmemory;

pub use bus::{EventBus, QueueEventBus};
#[cfg(feature = "eventing")]
pub use consumer::{ConsumerConfig, ConsumerHandle, DeadLetterPolicy, EventConsumer};
pub use handler::EventHandler;
pub use queue::{
    DEFAULT_VISIBILITY_TIMEOUT, MessageEnvelope, MessageQueue, effective_visibility_timeout,
};
pub use queue_inmemory::{InMemoryMessageQueue, InMemorySessions};
