use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// 领域事件载荷
///
/// 事件以外部标签枚举表示，每个变体对应一个稳定的事件类型标签。
/// 通常由 `#[event]` 宏生成实现；手写实现时须保证 `EVENT_TYPES`、`event_type`
/// 与 `variant_of` 三者一致。
pub trait DomainEvent:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 全部已注册的事件类型标签
    const EVENT_TYPES: &'static [&'static str];

    /// 当前变体的事件类型标签
    fn event_type(&self) -> &'static str;

    /// 标签 → 变体名（序列化时的外部标签）；未注册返回 `None`
    fn variant_of(event_type: &str) -> Option<&'static str>;
}
