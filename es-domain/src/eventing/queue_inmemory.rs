//! 内存版消息队列（InMemoryMessageQueue）
//!
//! 以 `Mutex` 保护的有序表模拟可见性超时队列，满足 `MessageQueue` 协议；
//! 会话类型为 `()`，典型用途：测试环境、示例与本地开发。
//!
use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::{MessageEnvelope, MessageQueue, effective_visibility_timeout};
use crate::persist::SessionProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredMessage {
    read_count: i64,
    enqueued_at: DateTime<Utc>,
    visible_at: DateTime<Utc>,
    message: Value,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: i64,
    queues: HashMap<String, BTreeMap<i64, StoredMessage>>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, queue: &str) -> Result<MutexGuard<'_, QueueState>> {
        self.inner
            .lock()
            .map_err(|_| DomainError::message_queue(queue, "queue state poisoned"))
    }

    /// 队列中（含隐藏中）的消息数
    pub fn len(&self, queue: &str) -> usize {
        self.state(queue)
            .map(|s| s.queues.get(queue).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// 当前可被读取（未处于隐藏期）的消息数
    pub fn visible_len(&self, queue: &str) -> usize {
        let now = Utc::now();
        self.state(queue)
            .map(|s| {
                s.queues
                    .get(queue)
                    .map(|q| q.values().filter(|m| m.visible_at <= now).count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// 按入队顺序返回队列中所有消息负载
    pub fn messages(&self, queue: &str) -> Vec<Value> {
        self.state(queue)
            .map(|s| {
                s.queues
                    .get(queue)
                    .map(|q| q.values().map(|m| m.message.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    type Session = ();

    async fn send(&self, _session: &mut (), queue: &str, message: &Value) -> Result<i64> {
        let mut state = self.state(queue)?;
        state.next_id += 1;
        let msg_id = state.next_id;
        let now = Utc::now();
        state.queues.entry(queue.to_string()).or_default().insert(
            msg_id,
            StoredMessage {
                read_count: 0,
                enqueued_at: now,
                visible_at: now,
                message: message.clone(),
            },
        );
        Ok(msg_id)
    }

    async fn read(
        &self,
        _session: &mut (),
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<MessageEnvelope>> {
        let hidden_for = chrono::Duration::from_std(effective_visibility_timeout(visibility_timeout))
            .map_err(|e| DomainError::message_queue(queue, e.to_string()))?;

        let mut state = self.state(queue)?;
        let Some(messages) = state.queues.get_mut(queue) else {
            return Ok(None);
        };

        let now = Utc::now();
        let Some((msg_id, stored)) = messages.iter_mut().find(|(_, m)| m.visible_at <= now) else {
            return Ok(None);
        };

        stored.read_count += 1;
        stored.visible_at = now + hidden_for;

        Ok(Some(
            MessageEnvelope::builder()
                .msg_id(*msg_id)
                .read_count(stored.read_count)
                .enqueued_at(stored.enqueued_at)
                .visible_at(stored.visible_at)
                .message(stored.message.clone())
                .build(),
        ))
    }

    async fn delete(&self, _session: &mut (), queue: &str, msg_id: i64) -> Result<bool> {
        let mut state = self.state(queue)?;
        let Some(messages) = state.queues.get_mut(queue) else {
            return Ok(false);
        };
        let removed = messages.remove(&msg_id).is_some();
        if messages.is_empty() {
            state.queues.remove(queue);
        }
        Ok(removed)
    }
}

/// 内存后端的会话提供者（会话为 `()`）
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemorySessions;

#[async_trait]
impl SessionProvider for InMemorySessions {
    type Session = ();
    type Guard = Box<()>;

    async fn acquire(&self) -> Result<Self::Guard> {
        Ok(Box::new(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn read_hides_message_until_visibility_timeout() {
        let q = InMemoryMessageQueue::new();
        let id = q.send(&mut (), "content", &json!({"n": 1})).await.unwrap();

        let first = q
            .read(&mut (), "content", Duration::from_millis(200))
            .await
            .unwrap()
            .expect("visible message");
        assert_eq!(first.msg_id(), id);
        assert_eq!(first.read_count(), 1);
        assert!(first.visible_at() > first.enqueued_at());

        // 隐藏期间不可再次读取
        let hidden = q
            .read(&mut (), "content", Duration::from_millis(200))
            .await
            .unwrap();
        assert!(hidden.is_none());

        tokio::time::sleep(Duration::from_millis(300)).await;

        let again = q
            .read(&mut (), "content", Duration::from_millis(200))
            .await
            .unwrap()
            .expect("redelivered message");
        assert_eq!(again.msg_id(), id);
        assert_eq!(again.read_count(), 2);
        assert_eq!(again.message(), &json!({"n": 1}));
    }

    #[tokio::test]
    async fn zero_timeout_falls_back_to_default() {
        let q = InMemoryMessageQueue::new();
        q.send(&mut (), "content", &json!(1)).await.unwrap();

        let env = q
            .read(&mut (), "content", Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        let hidden = env.visible_at() - Utc::now();
        assert!(hidden > chrono::Duration::seconds(25));
        assert!(hidden <= chrono::Duration::seconds(30));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let q = InMemoryMessageQueue::new();
        let id = q.send(&mut (), "content", &json!({})).await.unwrap();

        assert!(q.delete(&mut (), "content", id).await.unwrap());
        assert!(!q.delete(&mut (), "content", id).await.unwrap());
        assert!(!q.delete(&mut (), "missing", id).await.unwrap());
        assert!(q.is_empty("content"));
    }

    #[tokio::test]
    async fn drained_queue_releases_its_entry() {
        let q = InMemoryMessageQueue::new();
        let a = q.send(&mut (), "content", &json!("a")).await.unwrap();
        let b = q.send(&mut (), "content", &json!("b")).await.unwrap();

        assert!(q.delete(&mut (), "content", a).await.unwrap());
        assert!(q.inner.lock().unwrap().queues.contains_key("content"));

        assert!(q.delete(&mut (), "content", b).await.unwrap());
        assert!(q.inner.lock().unwrap().queues.is_empty());

        // 再次写入时重新建立
        q.send(&mut (), "content", &json!("c")).await.unwrap();
        assert_eq!(q.len("content"), 1);
    }

    #[tokio::test]
    async fn visible_len_excludes_hidden_messages() {
        let q = InMemoryMessageQueue::new();
        q.send(&mut (), "content", &json!(1)).await.unwrap();
        q.send(&mut (), "content", &json!(2)).await.unwrap();

        q.read(&mut (), "content", Duration::from_secs(30)).await.unwrap();
        assert_eq!(q.len("content"), 2);
        assert_eq!(q.visible_len("content"), 1);
    }

    #[tokio::test]
    async fn reads_in_fifo_order_and_isolates_queues() {
        let q = InMemoryMessageQueue::new();
        let a = q.send(&mut (), "content", &json!("a")).await.unwrap();
        let b = q.send(&mut (), "content", &json!("b")).await.unwrap();
        q.send(&mut (), "other", &json!("x")).await.unwrap();

        let vt = Duration::from_secs(30);
        assert_eq!(q.read(&mut (), "content", vt).await.unwrap().unwrap().msg_id(), a);
        assert_eq!(q.read(&mut (), "content", vt).await.unwrap().unwrap().msg_id(), b);
        assert!(q.read(&mut (), "content", vt).await.unwrap().is_none());
        assert_eq!(q.len("other"), 1);
    }
}
