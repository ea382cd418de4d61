//! 事件序列化
//!
//! 事件枚举以外部标签形式序列化为 `{"Variant": {..fields}}`，持久化时拆分为
//! 事件类型标签（`DomainEvent::event_type`）与字段对象（`data`）；
//! 反序列化时按标签查回变体名并重新组装。
//!
use crate::{
    aggregate::Aggregate,
    domain_event::{DomainEvent, EventContext},
    entity::Entity,
    error::{DomainError, DomainResult as Result},
    persist::SerializedEvent,
};
use serde_json::{Map, Value};

/// 将聚合的一个事件序列化为待持久化的事件记录
///
/// `version` 为该事件产生后的聚合版本。
pub fn serialize_event<A>(
    aggregate: &A,
    event: &A::Event,
    version: usize,
    context: Option<&EventContext>,
) -> Result<SerializedEvent>
where
    A: Aggregate,
{
    let event_type = event.event_type();
    let variant = <A::Event as DomainEvent>::variant_of(event_type).ok_or_else(|| {
        DomainError::UnsupportedEventVariant {
            event_type: event_type.to_string(),
        }
    })?;

    let data = match serde_json::to_value(event)? {
        Value::Object(mut obj) if obj.len() == 1 => obj.remove(variant),
        _ => None,
    }
    .ok_or_else(|| DomainError::UnsupportedEventVariant {
        event_type: event_type.to_string(),
    })?;

    let metadata = context.map(serde_json::to_value).transpose()?;

    Ok(SerializedEvent::builder()
        .aggregate_id(aggregate.id().to_string())
        .tenant_id(aggregate.tenant_id().to_string())
        .aggregate_type(A::TYPE.to_string())
        .event_type(event_type.to_string())
        .data(data)
        .maybe_metadata(metadata)
        .version(version)
        .build())
}

/// 按事件类型标签将事件记录还原为具体事件
pub fn deserialize_event<E>(event: &SerializedEvent) -> Result<E>
where
    E: DomainEvent,
{
    let variant =
        E::variant_of(event.event_type()).ok_or_else(|| DomainError::UnsupportedEventVariant {
            event_type: event.event_type().to_string(),
        })?;

    let mut tagged = Map::with_capacity(1);
    tagged.insert(variant.to_string(), event.data().clone());
    Ok(serde_json::from_value(Value::Object(tagged))?)
}

/// 读取事件记录中的业务上下文
pub fn event_context(event: &SerializedEvent) -> Result<Option<EventContext>> {
    EventContext::from_event(event)
}
