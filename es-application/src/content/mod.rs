//! 内容（content）限界上下文
//!
//! 内容是一组可编辑字段（JSON 对象）。写侧以事件溯源聚合记录创建、字段修改与字段评论；
//! 读侧由 `ContentEventHandler` 消费事件队列，维护 `ContentProjection` 读模型。
//!
mod aggregate;
mod commands;
mod error;
mod event;
mod event_handler;
mod projection;

pub use aggregate::{Author, Comment, ContentAggregate, FieldComment};
pub use commands::{AddContentFieldComment, ContentCommandHandler, CreateContent, UpdateContentField};
pub use error::ContentError;
pub use event::ContentEvent;
pub use event_handler::ContentEventHandler;
pub use projection::{
    ContentFieldChange, ContentFieldComment, ContentProjection, ContentProjectionRepository,
    InMemoryContentProjectionRepository,
};
