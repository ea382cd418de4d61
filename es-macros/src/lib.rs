//! 事件溯源过程宏（es-macros）
//!
//! - `#[aggregate(event = XxxEvent)]`：为聚合结构体注入标识/租户/版本/未提交事件字段，
//!   并实现 `Entity` 与 `EventSourced`；
//! - `#[event]`：为事件枚举生成事件类型标签及其反向映射（`DomainEvent`）。
//!
use proc_macro::TokenStream;

mod aggregate;
mod event;
mod utils;

/// 聚合宏
/// - 追加字段：`id: String`, `tenant_id: String`, `version: usize`（置于最前），
///   `changes: Vec<Event>`（`#[serde(skip)]`，置于最后）
/// - 自动实现 `::es_domain::entity::Entity` 与 `::es_domain::aggregate::EventSourced`
/// - 必填参数：`#[aggregate(event = EventType)]`
#[proc_macro_attribute]
pub fn aggregate(attr: TokenStream, item: TokenStream) -> TokenStream {
    aggregate::expand(attr, item)
}

/// 事件宏
///
/// 仅支持形如：
/// ```ignore
/// #[event]
/// pub enum XxxEvent {
///     #[event(event_type = "XXX_CREATED_V1")]
///     Created { field_a: T },
///     Renamed { name: String }, // 标签默认为 "XxxEvent.Renamed"
/// }
/// ```
/// 的具名字段变体。标签在同一枚举内必须唯一。
#[proc_macro_attribute]
pub fn event(attr: TokenStream, item: TokenStream) -> TokenStream {
    event::expand(attr, item)
}
