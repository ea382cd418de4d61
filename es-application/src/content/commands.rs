//! 内容命令与命令处理
//!
//! 每条命令在调用方传入的会话内执行 加载 → 执行 → 保存，
//! 业务上下文（`AppContext::biz`）随事件写入元数据。
//!
use super::{Author, ContentAggregate, ContentError};
use crate::{
    command::Command, command_handler::CommandHandler, context::AppContext, error::AppError,
};
use async_trait::async_trait;
use es_domain::aggregate::EventSourced;
use es_domain::entity::Entity;
use es_domain::error::DomainError;
use es_domain::persist::AggregateStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContent {
    pub aggregate_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub content_type: String,
    pub content: Option<Map<String, Value>>,
}

impl Command for CreateContent {
    const NAME: &'static str = "content.create";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateContentField {
    pub aggregate_id: String,
    pub tenant_id: String,
    pub field_name: String,
    pub before_value: Value,
    pub after_value: Value,
    pub created_by_id: String,
    pub created_by_name: String,
}

impl Command for UpdateContentField {
    const NAME: &'static str = "content.update_field";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddContentFieldComment {
    pub aggregate_id: String,
    pub tenant_id: String,
    pub field_name: String,
    pub comment: String,
    pub created_by_id: String,
    pub created_by_name: String,
}

impl Command for AddContentFieldComment {
    const NAME: &'static str = "content.add_field_comment";
}

/// 内容命令处理器，对三种内容命令共用同一个聚合存储
#[derive(Debug, Clone)]
pub struct ContentCommandHandler<S> {
    store: S,
}

impl<S> ContentCommandHandler<S>
where
    S: AggregateStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 加载已存在的内容；从未创建（版本为 0）视为不存在
    async fn load(
        &self,
        session: &mut S::Session,
        aggregate_id: String,
        tenant_id: String,
    ) -> Result<ContentAggregate, AppError> {
        let mut content = ContentAggregate::try_new(aggregate_id, tenant_id)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.store.load(session, &mut content).await?;
        if content.version() == 0 {
            return Err(AppError::AggregateNotFound(content.id().to_string()));
        }
        Ok(content)
    }

    async fn save(
        &self,
        session: &mut S::Session,
        ctx: &AppContext,
        content: &mut ContentAggregate,
    ) -> Result<(), AppError> {
        self.store
            .save_with_context(session, &*content, Some(&ctx.biz))
            .await?;
        content.clear_changes();
        Ok(())
    }
}

#[async_trait]
impl<S> CommandHandler<CreateContent> for ContentCommandHandler<S>
where
    S: AggregateStore,
{
    type Session = S::Session;

    async fn handle(
        &self,
        session: &mut S::Session,
        ctx: &AppContext,
        cmd: CreateContent,
    ) -> Result<(), AppError> {
        if self.store.exists(session, &cmd.aggregate_id).await? {
            let err = ContentError::AlreadyExists(cmd.aggregate_id);
            return Err(DomainError::rule_violation(err).into());
        }

        let mut content = ContentAggregate::try_new(cmd.aggregate_id, cmd.tenant_id)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .with_content_type(cmd.content_type);
        content.create_content(cmd.content)?;
        self.save(session, ctx, &mut content).await?;

        info!(command = CreateContent::NAME, aggregate_id = %content.id(), "content created");
        Ok(())
    }
}

#[async_trait]
impl<S> CommandHandler<UpdateContentField> for ContentCommandHandler<S>
where
    S: AggregateStore,
{
    type Session = S::Session;

    async fn handle(
        &self,
        session: &mut S::Session,
        ctx: &AppContext,
        cmd: UpdateContentField,
    ) -> Result<(), AppError> {
        let mut content = self.load(session, cmd.aggregate_id, cmd.tenant_id).await?;
        content.update_field(
            cmd.field_name,
            cmd.before_value,
            cmd.after_value,
            &Author::new(cmd.created_by_id, cmd.created_by_name),
        )?;
        self.save(session, ctx, &mut content).await?;

        info!(
            command = UpdateContentField::NAME,
            aggregate_id = %content.id(),
            version = content.version(),
            "content field updated"
        );
        Ok(())
    }
}

#[async_trait]
impl<S> CommandHandler<AddContentFieldComment> for ContentCommandHandler<S>
where
    S: AggregateStore,
{
    type Session = S::Session;

    async fn handle(
        &self,
        session: &mut S::Session,
        ctx: &AppContext,
        cmd: AddContentFieldComment,
    ) -> Result<(), AppError> {
        let mut content = self.load(session, cmd.aggregate_id, cmd.tenant_id).await?;
        content.add_field_comment(
            cmd.field_name,
            cmd.comment,
            &Author::new(cmd.created_by_id, cmd.created_by_name),
        )?;
        self.save(session, ctx, &mut content).await?;

        info!(
            command = AddContentFieldComment::NAME,
            aggregate_id = %content.id(),
            version = content.version(),
            "content field comment added"
        );
        Ok(())
    }
}
