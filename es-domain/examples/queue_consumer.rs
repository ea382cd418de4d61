/// 事件存储 + 队列消费者（内存版）示例
/// 展示 save → 发布到聚合类型队列 → 消费者轮询处理 → 删除消息 的闭环，
/// 以及处理失败后经可见性超时重新投递
use anyhow::Result as AnyResult;
use es_domain::aggregate::{Aggregate, EventSourced};
use es_domain::entity::Entity;
use es_domain::eventing::{
    ConsumerConfig, EventConsumer, EventHandler, InMemoryMessageQueue, InMemorySessions,
    QueueEventBus,
};
use es_domain::persist::{
    AggregateStore, EventStore, InMemoryEventRepository, InMemorySnapshotRepository,
    SerializedEvent, deserialize_event,
};
use es_macros::{aggregate, event};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, thiserror::Error)]
enum AccountError {
    #[error("insufficient balance: balance={balance}, amount={amount}")]
    Insufficient { balance: i64, amount: i64 },
}

#[event]
enum AccountEvent {
    #[event(event_type = "ACCOUNT_DEPOSITED_V1")]
    Deposited { amount: i64 },
    #[event(event_type = "ACCOUNT_WITHDRAWN_V1")]
    Withdrawn { amount: i64 },
}

#[aggregate(event = AccountEvent)]
struct Account {
    balance: i64,
}

impl Aggregate for Account {
    const TYPE: &'static str = "account";
    type Error = AccountError;

    fn when(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            AccountEvent::Deposited { amount } => self.balance += amount,
            AccountEvent::Withdrawn { amount } => {
                if self.balance < *amount {
                    return Err(AccountError::Insufficient {
                        balance: self.balance,
                        amount: *amount,
                    });
                }
                self.balance -= amount;
            }
        }
        Ok(())
    }
}

// 读模型：余额投影，第一次处理故意失败以演示重新投递
#[derive(Default)]
struct BalanceProjection {
    balance: AtomicI64,
    version: AtomicI64,
    failed_once: AtomicBool,
}

#[async_trait::async_trait]
impl EventHandler for BalanceProjection {
    fn handler_name(&self) -> &str {
        "balance-projection"
    }

    fn aggregate_type(&self) -> &str {
        Account::TYPE
    }

    async fn handle(&self, event: &SerializedEvent) -> anyhow::Result<()> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            anyhow::bail!("projection store unavailable");
        }

        // 幂等：跳过已投影的版本；乱序到达的后续版本留待重新投递
        let version = event.version() as i64;
        let current = self.version.load(Ordering::SeqCst);
        if version <= current {
            return Ok(());
        }
        if version != current + 1 {
            anyhow::bail!("out of order: projected={current}, got={version}");
        }

        match deserialize_event::<AccountEvent>(event)? {
            AccountEvent::Deposited { amount } => self.balance.fetch_add(amount, Ordering::SeqCst),
            AccountEvent::Withdrawn { amount } => self.balance.fetch_sub(amount, Ordering::SeqCst),
        };
        self.version.store(version, Ordering::SeqCst);
        tracing::info!(version, balance = self.balance.load(Ordering::SeqCst), "projection updated");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,es_domain=debug")))
        .init();

    let queue = InMemoryMessageQueue::new();
    let store = EventStore::new(
        InMemoryEventRepository::new(),
        InMemorySnapshotRepository::new(),
        QueueEventBus::new(queue.clone()),
    );

    let projection = Arc::new(BalanceProjection::default());
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(queue.clone())
        .handler(projection.clone() as Arc<dyn EventHandler>)
        .config(ConsumerConfig {
            poll_interval: Duration::from_millis(100),
            visibility_timeout: Duration::from_millis(500),
            ..ConsumerConfig::default()
        })
        .build()
        .start();

    let mut account = Account::new("acc-1".to_string(), "tenant-1".to_string());
    account.apply_new(AccountEvent::Deposited { amount: 100 })?;
    account.apply_new(AccountEvent::Withdrawn { amount: 30 })?;
    store.save(&mut (), &account).await?;
    account.clear_changes();

    if let Err(err) = account.apply_new(AccountEvent::Withdrawn { amount: 500 }) {
        tracing::warn!(error = %err, "command rejected");
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while !queue.is_empty(Account::TYPE) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await?;

    let mut reloaded = Account::new("acc-1".to_string(), "tenant-1".to_string());
    store.load(&mut (), &mut reloaded).await?;
    tracing::info!(
        version = reloaded.version(),
        balance = reloaded.balance,
        projected = projection.balance.load(Ordering::SeqCst),
        "done"
    );

    handle.shutdown();
    handle.join().await;
    Ok(())
}
