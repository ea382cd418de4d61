//! 内容读模型
//!
//! 以 (tenant_id, id) 定位，`version` 记录已应用的最新事件版本，
//! 用于事件处理器跳过重复投递。
//!
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFieldChange {
    pub name: String,
    pub before_value: Value,
    pub after_value: Value,
    pub created_by_id: String,
    pub created_by_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFieldComment {
    pub name: String,
    pub comment: String,
    pub created_by_id: String,
    pub created_by_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentProjection {
    pub id: String,
    pub tenant_id: String,
    pub content: Map<String, Value>,
    pub content_type: String,
    /// 字段修改历史，按发生顺序
    pub field_changes: Vec<ContentFieldChange>,
    pub field_comments: Vec<ContentFieldComment>,
    pub version: usize,
}

impl ContentProjection {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        content: Map<String, Value>,
        content_type: impl Into<String>,
        version: usize,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            content,
            content_type: content_type.into(),
            field_changes: Vec::new(),
            field_comments: Vec::new(),
            version,
        }
    }

    pub fn update_field(&mut self, change: ContentFieldChange) {
        self.content
            .insert(change.name.clone(), change.after_value.clone());
        self.field_changes.push(change);
    }

    pub fn add_field_comment(&mut self, comment: ContentFieldComment) {
        self.field_comments.push(comment);
    }
}

#[async_trait]
pub trait ContentProjectionRepository: Send + Sync {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<ContentProjection>, AppError>;

    /// 按 (tenant_id, id) 覆盖写入
    async fn save(&self, projection: ContentProjection) -> Result<(), AppError>;
}

/// 进程内读模型仓储，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentProjectionRepository {
    rows: Arc<Mutex<HashMap<(String, String), ContentProjection>>>,
}

impl InMemoryContentProjectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), ContentProjection>>, AppError>
    {
        self.rows
            .lock()
            .map_err(|_| AppError::Infra("projection store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ContentProjectionRepository for InMemoryContentProjectionRepository {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<ContentProjection>, AppError> {
        let rows = self.lock()?;
        Ok(rows.get(&(tenant_id.to_string(), id.to_string())).cloned())
    }

    async fn save(&self, projection: ContentProjection) -> Result<(), AppError> {
        let mut rows = self.lock()?;
        rows.insert(
            (projection.tenant_id.clone(), projection.id.clone()),
            projection,
        );
        Ok(())
    }
}
