//! 数据库连接配置
//!
//! 环境变量：
//! - `DATABASE_URL`：连接串，缺省 `sqlite://eventstore.db`
//! - `ES_DB_MAX_CONNECTIONS`：连接池上限，缺省 5
//!
use es_domain::error::DomainResult as Result;
use tracing::warn;

const DEFAULT_URL: &str = "sqlite://eventstore.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.url = url;
        }

        if let Some(raw) = lookup("ES_DB_MAX_CONNECTIONS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.max_connections = n,
                _ => warn!(value = %raw, "invalid ES_DB_MAX_CONNECTIONS, using default"),
            }
        }

        config
    }

    /// 连接 SQLite（文件不存在时创建，启用 WAL，写锁等待上限 5 秒）
    #[cfg(feature = "sqlite")]
    pub async fn connect_sqlite(&self) -> Result<sqlx::SqlitePool> {
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&self.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        Ok(SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?)
    }

    #[cfg(feature = "postgres")]
    pub async fn connect_postgres(&self) -> Result<sqlx::PgPool> {
        Ok(sqlx::postgres::PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await?)
    }
}
