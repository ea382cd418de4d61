use crate::{error::DomainResult, persist::SerializedEvent};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 事件的业务语境，随事件写入 `metadata` 列
///
/// 字段全部可选；缺省字段不会出现在序列化结果中，
/// 未设置任何字段的上下文序列化为 `{}`。
#[derive(Builder, Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// 同一业务请求链路共享的关联 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    /// 直接触发本事件的上游事件或命令
    #[serde(default, skip_serializing_if = "Option::is_none")]
    causation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor_id: Option<String>,
    /// 调用方自定义的附加字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extensions: Option<Value>,
}

impl EventContext {
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn extensions(&self) -> Option<&Value> {
        self.extensions.as_ref()
    }

    /// 读取扩展字段中的单个键
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.as_ref()?.get(key)
    }

    /// 写入一个扩展字段；原扩展不是对象时整体替换
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        let mut map = match self.extensions.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(key.into(), value);
        self.extensions = Some(Value::Object(map));
        self
    }

    /// 从持久化事件中取回写入时附带的上下文
    pub fn from_event(event: &SerializedEvent) -> DomainResult<Option<Self>> {
        Ok(event
            .metadata()
            .cloned()
            .map(serde_json::from_value)
            .transpose()?)
    }

    /// 为由 `event` 触发的后续写入构造上下文
    ///
    /// 关联 ID 与操作主体沿用上游事件的上下文；上游没有关联 ID 时，
    /// 以上游事件自身作为链路起点。因果 ID 固定指向上游事件。
    pub fn caused_by(event: &SerializedEvent) -> DomainResult<Self> {
        let origin = format!("{}@{}", event.aggregate_id(), event.version());
        let upstream = Self::from_event(event)?.unwrap_or_default();

        Ok(Self {
            correlation_id: upstream.correlation_id.or_else(|| Some(origin.clone())),
            causation_id: Some(origin),
            actor_type: upstream.actor_type,
            actor_id: upstream.actor_id,
            extensions: None,
        })
    }
}
