use es_domain::domain_event::EventContext;

/// 应用层上下文（Application Context）
///
/// 承载一次命令调用所需的横切信息：
/// - 业务语境（`EventContext`）：关联追踪 `correlation_id`、因果链 `causation_id`、
///   执行者类型/ID 等，保存时写入事件元数据；
/// - 幂等键（`idempotency_key`）：用于在基础设施层实现请求幂等。
///
/// ```rust
/// use es_application::context::AppContext;
/// use es_domain::domain_event::EventContext;
///
/// let ctx = AppContext {
///     biz: EventContext::builder()
///         .correlation_id("cor-123".into())
///         .actor_type("user".into())
///         .actor_id("u-1".into())
///         .build(),
///     idempotency_key: Some("idem-xyz".into()),
/// };
/// assert_eq!(ctx.biz.actor_id(), Some("u-1"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub biz: EventContext,
    /// 为空则由上层或基础设施决定是否参与幂等
    pub idempotency_key: Option<String>,
}
