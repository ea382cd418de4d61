use crate::error::DomainResult as Result;
use async_trait::async_trait;
use std::ops::DerefMut;

/// 会话提供者：为后台任务（如队列消费者）按需获取会话。
///
/// 请求链路中的会话由调用方自行开启并逐层传递，不经过该接口。
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Send;
    /// 归还时自动释放的会话守卫，例如连接池连接
    type Guard: DerefMut<Target = Self::Session> + Send;

    async fn acquire(&self) -> Result<Self::Guard>;
}
