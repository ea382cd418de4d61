//! 领域层统一错误定义
//!
//! 存储、队列与聚合在各实现层都归一为 `DomainError`，应用层再据此决定重试或反馈。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    /// 聚合拒绝了事件，原始错误保存在 `source` 中
    #[error("domain rule violation: {source}")]
    DomainRuleViolation {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// 保存时已持久化版本与加载时版本不一致；调用方应重新加载后重试命令
    ///
    /// `actual` 为 `None` 表示冲突由存储唯一约束发现，此时无法得知实际版本。
    #[error("concurrency conflict: aggregate={aggregate_id}, expected={expected}, actual={actual:?}")]
    ConcurrencyConflict {
        aggregate_id: String,
        expected: usize,
        actual: Option<usize>,
    },

    /// 存储中出现了事件枚举不认识的类型标签
    #[error("unknown event type: aggregate_type={aggregate_type}, event_type={event_type}")]
    UnknownEventType {
        aggregate_type: String,
        event_type: String,
    },
    #[error("unsupported event variant: {event_type}")]
    UnsupportedEventVariant { event_type: String },

    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    /// 快照或事件记录的聚合类型与目标聚合不符
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    #[error("message queue error: queue={queue}, reason={reason}")]
    MessageQueue { queue: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },
}

impl DomainError {
    pub fn rule_violation<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DomainError::DomainRuleViolation {
            source: Box::new(err),
        }
    }

    pub fn database(reason: impl Into<String>) -> Self {
        DomainError::Database {
            reason: reason.into(),
        }
    }

    pub fn message_queue(queue: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::MessageQueue {
            queue: queue.into(),
            reason: reason.into(),
        }
    }

    /// 冲突可通过重新加载聚合后重试解决
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::ConcurrencyConflict { .. })
    }

    /// 若为领域规则违例，尝试取出聚合自身的错误类型
    pub fn rule_violation_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            DomainError::DomainRuleViolation { source } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

// sqlx 错误统一折叠为 Database；唯一约束冲突由基础设施层先行识别
#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::database(err.to_string())
    }
}
