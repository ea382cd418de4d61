//! 实体（Entity）抽象
//!
//! 事件溯源聚合的标识部分：聚合 ID、租户 ID 与已应用事件数（版本）。
//!
pub trait Entity: Send + Sync {
    /// 构造一个空白实体，版本为 0
    fn new(id: String, tenant_id: String) -> Self;

    fn id(&self) -> &str;

    fn tenant_id(&self) -> &str;

    /// 已应用的事件总数（快照基线 + 重放 + 新产生）
    fn version(&self) -> usize;
}
