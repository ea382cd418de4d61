//! 应用层（es-application）
//!
//! 命令、命令处理器与应用上下文，以及基于事件溯源的内容（content）限界上下文：
//! 聚合、命令处理、读模型投影与投影事件处理器。
//!
pub mod command;
pub mod command_handler;
pub mod content;
pub mod context;
pub mod error;
