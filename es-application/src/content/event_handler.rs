//! 内容投影事件处理器
//!
//! 消费 `content` 队列中的事件并更新读模型。按版本实现幂等：
//! 不高于读模型版本的事件直接跳过；出现版本缺口时返回错误，
//! 消息保留在队列中等待重新投递。
//!
use super::{
    ContentAggregate, ContentEvent, ContentFieldChange, ContentFieldComment, ContentProjection,
    ContentProjectionRepository,
};
use anyhow::{Context, bail};
use async_trait::async_trait;
use es_domain::aggregate::Aggregate;
use es_domain::eventing::EventHandler;
use es_domain::persist::{SerializedEvent, deserialize_event};
use tracing::debug;

pub struct ContentEventHandler<R> {
    projections: R,
}

impl<R> ContentEventHandler<R>
where
    R: ContentProjectionRepository,
{
    pub fn new(projections: R) -> Self {
        Self { projections }
    }

    pub fn projections(&self) -> &R {
        &self.projections
    }
}

#[async_trait]
impl<R> EventHandler for ContentEventHandler<R>
where
    R: ContentProjectionRepository,
{
    fn handler_name(&self) -> &str {
        "content-projection"
    }

    fn aggregate_type(&self) -> &str {
        ContentAggregate::TYPE
    }

    async fn handle(&self, event: &SerializedEvent) -> anyhow::Result<()> {
        let decoded: ContentEvent = deserialize_event(event).with_context(|| {
            format!(
                "decode {} of aggregate {}",
                event.event_type(),
                event.aggregate_id()
            )
        })?;

        let version = event.version();
        let current = self
            .projections
            .find(event.tenant_id(), event.aggregate_id())
            .await?;

        if let Some(projection) = &current {
            if version <= projection.version {
                debug!(
                    aggregate_id = %event.aggregate_id(),
                    version,
                    projected = projection.version,
                    "event already projected, skipping"
                );
                return Ok(());
            }
        }

        let projection = match decoded {
            ContentEvent::Created {
                content,
                content_type,
            } => {
                if version != 1 {
                    bail!(
                        "content {} created at version {version}, expected 1",
                        event.aggregate_id()
                    );
                }
                ContentProjection::new(
                    event.aggregate_id(),
                    event.tenant_id(),
                    content,
                    content_type,
                    version,
                )
            }
            ContentEvent::FieldUpdated {
                field_name,
                before_value,
                after_value,
                created_by_id,
                created_by_name,
                ..
            } => {
                let mut projection = next_version(current, event)?;
                projection.update_field(ContentFieldChange {
                    name: field_name,
                    before_value,
                    after_value,
                    created_by_id,
                    created_by_name,
                });
                projection
            }
            ContentEvent::FieldCommentAdded {
                field_name,
                comment,
                created_by_id,
                created_by_name,
            } => {
                let mut projection = next_version(current, event)?;
                projection.add_field_comment(ContentFieldComment {
                    name: field_name,
                    comment,
                    created_by_id,
                    created_by_name,
                });
                projection
            }
        };

        self.projections.save(projection).await?;
        Ok(())
    }
}

/// 事件必须紧接读模型当前版本
fn next_version(
    current: Option<ContentProjection>,
    event: &SerializedEvent,
) -> anyhow::Result<ContentProjection> {
    let version = event.version();
    let Some(mut projection) = current else {
        bail!(
            "content projection {} not found for version {version}",
            event.aggregate_id()
        );
    };
    if version != projection.version + 1 {
        bail!(
            "content projection {} at version {}, received version {version}",
            event.aggregate_id(),
            projection.version
        );
    }
    projection.version = version;
    Ok(projection)
}
