//! 事件处理器（EventHandler）
//!
//! 按聚合类型订阅队列中的事件，例如更新读模型。
//! 投递为至少一次且可能乱序，处理逻辑必须幂等。
//!
use crate::persist::SerializedEvent;
use async_trait::async_trait;

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志）
    fn handler_name(&self) -> &str;
    /// 订阅的聚合类型，即队列主题名
    fn aggregate_type(&self) -> &str;
    /// 处理事件；返回错误时消息保留在队列中，超时后重新投递
    async fn handle(&self, event: &SerializedEvent) -> anyhow::Result<()>;
}
