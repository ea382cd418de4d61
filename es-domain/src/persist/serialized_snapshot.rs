use crate::{
    aggregate::{Aggregate, EventSourced},
    entity::Entity,
    error::{DomainError, DomainResult as Result},
};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 聚合快照，每个聚合至多一份（按 aggregate_id 覆盖写入）
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedSnapshot {
    aggregate_id: String,
    tenant_id: String,
    aggregate_type: String,
    /// 聚合完整状态（不含未提交事件）
    state: Value,
    /// 快照对应的聚合版本
    version: usize,
}

impl SerializedSnapshot {
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn version(&self) -> usize {
        self.version
    }

    /// 将快照反序列化为聚合实例，版本以快照记录为准
    pub fn to_aggregate<A>(&self) -> Result<A>
    where
        A: Aggregate,
    {
        if A::TYPE != self.aggregate_type {
            return Err(DomainError::TypeMismatch {
                expected: A::TYPE.to_string(),
                found: self.aggregate_type.clone(),
            });
        }

        let mut aggregate: A = serde_json::from_value(self.state.clone())?;
        aggregate.set_version(self.version);
        Ok(aggregate)
    }

    /// 从聚合实例创建快照
    pub fn from_aggregate<A>(aggregate: &A) -> Result<Self>
    where
        A: Aggregate,
    {
        Ok(Self {
            aggregate_id: aggregate.id().to_string(),
            tenant_id: aggregate.tenant_id().to_string(),
            aggregate_type: A::TYPE.to_string(),
            state: serde_json::to_value(aggregate)?,
            version: aggregate.version(),
        })
    }
}
