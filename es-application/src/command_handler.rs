use crate::{command::Command, context::AppContext, error::AppError};
use async_trait::async_trait;

/// 命令处理器
///
/// 会话由调用方开启并传入，处理器在其中完成 加载 → 执行 → 保存；
/// 提交或回滚同样由调用方决定。
#[async_trait]
pub trait CommandHandler<C>: Send + Sync
where
    C: Command,
{
    type Session: Send;

    async fn handle(
        &self,
        session: &mut Self::Session,
        ctx: &AppContext,
        cmd: C,
    ) -> Result<(), AppError>;
}
