//! 队列消费者（EventConsumer）
//!
//! 两个协作的长驻任务：
//! - 轮询任务：每隔 `poll_interval` 从聚合类型对应的队列认领一条消息，
//!   经数据通道交给处理任务；读取错误经错误通道上报，不中断轮询；
//! - 处理任务：逐条解码并交给处理器，成功后删除消息；处理失败则保留消息，
//!   等待可见性超时后重新投递；无法解码或超过投递上限的消息转入死信队列。
//!
//! 通过 `ConsumerHandle` 取消并等待两个任务结束。被取消时正在进行的认领或处理
//! 直接放弃，已认领的消息在可见性超时后自动恢复可见。
//!
use crate::{
    error::{DomainError, DomainResult as Result},
    eventing::{EventHandler, MessageEnvelope, MessageQueue},
    persist::{SerializedEvent, SessionProvider},
};
use bon::Builder;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 死信策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterPolicy {
    /// 死信队列名 = 源队列名 + 后缀
    pub queue_suffix: String,
    /// 超过该读取次数的消息不再处理，直接转入死信队列
    pub max_deliveries: Option<i64>,
}

impl Default for DeadLetterPolicy {
    fn default() -> Self {
        Self {
            queue_suffix: "_dlq".to_string(),
            max_deliveries: None,
        }
    }
}

impl DeadLetterPolicy {
    pub fn queue_name(&self, queue: &str) -> String {
        format!("{queue}{}", self.queue_suffix)
    }
}

/// 消费者配置
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// 两次读取之间的休眠间隔
    pub poll_interval: Duration,
    /// 认领消息后的隐藏时长
    pub visibility_timeout: Duration,
    /// 为 `None` 时无法解码的消息记录日志后直接丢弃
    pub dead_letter: Option<DeadLetterPolicy>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            visibility_timeout: Duration::from_secs(30),
            dead_letter: Some(DeadLetterPolicy::default()),
        }
    }
}

#[derive(Builder)]
pub struct EventConsumer<P, Q> {
    sessions: P,
    queue: Q,
    handler: Arc<dyn EventHandler>,
    #[builder(default)]
    config: ConsumerConfig,
}

impl<P, Q> EventConsumer<P, Q>
where
    P: SessionProvider + 'static,
    Q: MessageQueue<Session = P::Session> + 'static,
{
    /// 启动轮询与处理任务，返回可用于关闭/等待的句柄
    pub fn start(self) -> ConsumerHandle {
        let token = CancellationToken::new();
        let (message_tx, message_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(16);

        info!(
            handler = self.handler.handler_name(),
            queue = self.handler.aggregate_type(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "event consumer started"
        );

        let consumer = Arc::new(self);
        let tasks = vec![
            tokio::spawn(
                consumer
                    .clone()
                    .poll_loop(token.clone(), message_tx, error_tx),
            ),
            tokio::spawn(consumer.dispatch_loop(token.clone(), message_rx, error_rx)),
        ];

        ConsumerHandle { token, tasks }
    }

    async fn poll_loop(
        self: Arc<Self>,
        token: CancellationToken,
        message_tx: mpsc::Sender<MessageEnvelope>,
        error_tx: mpsc::Sender<DomainError>,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(self.config.poll_interval) => {}
            }

            // 先占用通道空位再认领消息：处理中之外至多再持有一条已隐藏的消息
            let permit = tokio::select! {
                _ = token.cancelled() => break,
                permit = message_tx.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let polled = tokio::select! {
                _ = token.cancelled() => break,
                polled = self.poll_once() => polled,
            };

            match polled {
                Ok(Some(envelope)) => permit.send(envelope),
                Ok(None) => {}
                Err(err) => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        sent = error_tx.send(err) => if sent.is_err() { break },
                    }
                }
            }
        }

        debug!(handler = self.handler.handler_name(), "poller stopped");
    }

    async fn poll_once(&self) -> Result<Option<MessageEnvelope>> {
        let mut session = self.sessions.acquire().await?;
        self.queue
            .read(
                &mut *session,
                self.handler.aggregate_type(),
                self.config.visibility_timeout,
            )
            .await
    }

    async fn dispatch_loop(
        self: Arc<Self>,
        token: CancellationToken,
        mut message_rx: mpsc::Receiver<MessageEnvelope>,
        mut error_rx: mpsc::Receiver<DomainError>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(envelope) = message_rx.recv() => {
                    let cancelled = tokio::select! {
                        biased;
                        _ = token.cancelled() => true,
                        _ = self.dispatch(envelope) => false,
                    };
                    if cancelled {
                        break;
                    }
                }
                Some(err) = error_rx.recv() => {
                    warn!(
                        handler = self.handler.handler_name(),
                        queue = self.handler.aggregate_type(),
                        error = %err,
                        "failed to read from queue"
                    );
                }
                else => break,
            }
        }

        debug!(handler = self.handler.handler_name(), "dispatcher stopped");
    }

    async fn dispatch(&self, envelope: MessageEnvelope) {
        let handler = self.handler.handler_name();
        let queue = self.handler.aggregate_type();
        let msg_id = envelope.msg_id();

        let event = match serde_json::from_value::<SerializedEvent>(envelope.message().clone()) {
            Ok(event) => event,
            Err(err) => {
                error!(handler, queue, msg_id, error = %err, "failed to decode queued event");
                self.dead_letter(&envelope, "undecodable message").await;
                return;
            }
        };

        let max_deliveries = self
            .config
            .dead_letter
            .as_ref()
            .and_then(|policy| policy.max_deliveries);
        if let Some(max) = max_deliveries {
            if envelope.read_count() > max {
                warn!(
                    handler,
                    queue,
                    msg_id,
                    read_count = envelope.read_count(),
                    max_deliveries = max,
                    "delivery limit exceeded"
                );
                self.dead_letter(&envelope, "delivery limit exceeded").await;
                return;
            }
        }

        match self.handler.handle(&event).await {
            Ok(()) => match self.acknowledge(msg_id).await {
                Ok(true) => debug!(
                    handler,
                    queue,
                    msg_id,
                    aggregate_id = event.aggregate_id(),
                    version = event.version(),
                    "event handled"
                ),
                Ok(false) => warn!(handler, queue, msg_id, "handled message was already deleted"),
                Err(err) => warn!(
                    handler,
                    queue,
                    msg_id,
                    error = %err,
                    "failed to delete handled message; it will be redelivered"
                ),
            },
            Err(err) => warn!(
                handler,
                queue,
                msg_id,
                read_count = envelope.read_count(),
                aggregate_id = event.aggregate_id(),
                version = event.version(),
                error = %err,
                "event handler failed; message will be redelivered"
            ),
        }
    }

    async fn acknowledge(&self, msg_id: i64) -> Result<bool> {
        let mut session = self.sessions.acquire().await?;
        self.queue
            .delete(&mut *session, self.handler.aggregate_type(), msg_id)
            .await
    }

    async fn dead_letter(&self, envelope: &MessageEnvelope, reason: &str) {
        let queue = self.handler.aggregate_type();
        let msg_id = envelope.msg_id();

        let result: Result<bool> = async {
            let mut session = self.sessions.acquire().await?;
            match &self.config.dead_letter {
                Some(policy) => {
                    let dead_letter_queue = policy.queue_name(queue);
                    let dead_letter_id = self
                        .queue
                        .send(&mut *session, &dead_letter_queue, envelope.message())
                        .await?;
                    warn!(
                        queue,
                        msg_id,
                        dead_letter_queue = %dead_letter_queue,
                        dead_letter_id,
                        reason,
                        "message moved to dead-letter queue"
                    );
                }
                None => warn!(queue, msg_id, reason, "message dropped"),
            }
            self.queue.delete(&mut *session, queue, msg_id).await
        }
        .await;

        if let Err(err) = result {
            error!(queue, msg_id, error = %err, "failed to dead-letter message; it will be redelivered");
        }
    }
}

/// 消费者运行句柄：用于优雅关闭与等待任务结束
pub struct ConsumerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
