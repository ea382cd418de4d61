use super::{ContentError, ContentEvent};
use chrono::Utc;
use es_domain::aggregate::Aggregate;
use es_domain::entity::Entity;
use es_domain::error::{DomainError, DomainResult};
use es_macros::aggregate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 操作者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment: String,
    pub created_by_id: String,
    pub created_by_name: String,
}

/// 同一字段的评论按添加顺序归为一组
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldComment {
    pub field_name: String,
    pub comments: Vec<Comment>,
}

#[aggregate(event = ContentEvent)]
pub struct ContentAggregate {
    content: Map<String, Value>,
    content_type: String,
    field_comments: Vec<FieldComment>,
}

impl Aggregate for ContentAggregate {
    const TYPE: &'static str = "content";

    type Error = ContentError;

    fn when(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            ContentEvent::Created {
                content,
                content_type,
            } => {
                self.content = content.clone();
                self.content_type = content_type.clone();
            }
            ContentEvent::FieldUpdated {
                field_name,
                before_value,
                after_value,
                ..
            } => {
                let current = self
                    .content
                    .get_mut(field_name)
                    .ok_or_else(|| ContentError::FieldNotFound(field_name.clone()))?;
                if current != before_value {
                    return Err(ContentError::FieldUpdateConflict(field_name.clone()));
                }
                *current = after_value.clone();
            }
            ContentEvent::FieldCommentAdded {
                field_name,
                comment,
                created_by_id,
                created_by_name,
            } => {
                if !self.content.contains_key(field_name) {
                    return Err(ContentError::FieldNotFound(field_name.clone()));
                }

                let comment = Comment {
                    comment: comment.clone(),
                    created_by_id: created_by_id.clone(),
                    created_by_name: created_by_name.clone(),
                };
                match self
                    .field_comments
                    .iter_mut()
                    .find(|group| &group.field_name == field_name)
                {
                    Some(group) => group.comments.push(comment),
                    None => self.field_comments.push(FieldComment {
                        field_name: field_name.clone(),
                        comments: vec![comment],
                    }),
                }
            }
        }
        Ok(())
    }
}

impl ContentAggregate {
    /// 创建空白聚合；id 与 tenant_id 均不可为空
    pub fn try_new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Result<Self, ContentError> {
        let (id, tenant_id) = (id.into(), tenant_id.into());
        if id.is_empty() || tenant_id.is_empty() {
            return Err(ContentError::IdRequired);
        }
        Ok(Self::new(id, tenant_id))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn field_comments(&self) -> &[FieldComment] {
        &self.field_comments
    }

    pub fn create_content(&mut self, content: Option<Map<String, Value>>) -> DomainResult<()> {
        let content =
            content.ok_or_else(|| DomainError::rule_violation(ContentError::ContentRequired))?;
        self.apply_new(ContentEvent::Created {
            content,
            content_type: self.content_type.clone(),
        })
    }

    /// 仅当字段当前值等于 `before_value` 时修改
    pub fn update_field(
        &mut self,
        field_name: impl Into<String>,
        before_value: Value,
        after_value: Value,
        author: &Author,
    ) -> DomainResult<()> {
        self.apply_new(ContentEvent::FieldUpdated {
            field_name: field_name.into(),
            before_value,
            after_value,
            created_by_id: author.id.clone(),
            created_by_name: author.name.clone(),
            updated_at: Utc::now(),
        })
    }

    pub fn add_field_comment(
        &mut self,
        field_name: impl Into<String>,
        comment: impl Into<String>,
        author: &Author,
    ) -> DomainResult<()> {
        self.apply_new(ContentEvent::FieldCommentAdded {
            field_name: field_name.into(),
            comment: comment.into(),
            created_by_id: author.id.clone(),
            created_by_name: author.name.clone(),
        })
    }
}
