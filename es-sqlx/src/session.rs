use async_trait::async_trait;
use es_domain::error::DomainResult as Result;
use es_domain::persist::SessionProvider;
use sqlx::pool::PoolConnection;
use sqlx::{Database, Pool};

/// 从连接池按需借出连接，供队列消费者等后台任务使用
#[derive(Debug)]
pub struct PoolSessions<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> PoolSessions<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

impl<DB: Database> Clone for PoolSessions<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

#[async_trait]
impl<DB: Database> SessionProvider for PoolSessions<DB> {
    type Session = DB::Connection;
    type Guard = PoolConnection<DB>;

    async fn acquire(&self) -> Result<Self::Guard> {
        Ok(self.pool.acquire().await?)
    }
}
