use es_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("infra: {0}")]
    Infra(String),

    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),
}

impl AppError {
    /// 取出领域规则错误（`DomainRuleViolation`）的具体类型
    pub fn rule_violation_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            AppError::Domain(err) => err.rule_violation_as::<E>(),
            _ => None,
        }
    }
}
