//! 事件持久化模型（SerializedEvent）
//!
//! 事件在事件表与消息队列中的标准形态。`data` 为事件变体的字段对象，
//! 变体本身由 `event_type` 标签表达。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// 全局自增 ID，由存储层在持久化后赋值
    id: Option<i64>,
    /// 聚合 ID，标识事件所属的聚合实例
    aggregate_id: String,
    /// 租户 ID
    tenant_id: String,
    /// 聚合类型
    aggregate_type: String,
    /// 事件类型标签
    event_type: String,
    /// 事件负载
    data: Value,
    /// 业务上下文等旁路信息
    metadata: Option<Value>,
    /// 该事件产生后的聚合版本，(aggregate_id, version) 唯一
    version: usize,
    /// 事件发生时间
    #[builder(default = Utc::now())]
    created_at: DateTime<Utc>,
}

impl SerializedEvent {
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn version(&self) -> usize {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 存储层写入后回填自增 ID
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}
