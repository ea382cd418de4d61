use async_trait::async_trait;
use es_domain::eventing::{
    ConsumerConfig, DeadLetterPolicy, EventBus, EventConsumer, EventHandler, InMemoryMessageQueue,
    InMemorySessions, MessageQueue, QueueEventBus,
};
use es_domain::persist::SerializedEvent;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// 前 fail_first 次调用返回错误，之后记录事件
struct SpyHandler {
    fail_first: usize,
    calls: AtomicUsize,
    handled: Mutex<Vec<SerializedEvent>>,
}

impl SpyHandler {
    fn new(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            calls: AtomicUsize::new(0),
            handled: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn handled(&self) -> Vec<SerializedEvent> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for SpyHandler {
    fn handler_name(&self) -> &str {
        "spy"
    }

    fn aggregate_type(&self) -> &str {
        "doc"
    }

    async fn handle(&self, event: &SerializedEvent) -> anyhow::Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            anyhow::bail!("transient failure #{n}");
        }
        self.handled.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn doc_event(version: usize) -> SerializedEvent {
    SerializedEvent::builder()
        .id(version as i64)
        .aggregate_id("A1".to_string())
        .tenant_id("T1".to_string())
        .aggregate_type("doc".to_string())
        .event_type("DOC_FIELD_SET_V1".to_string())
        .data(json!({"name": "name", "value": version}))
        .version(version)
        .build()
}

fn fast_config(visibility_timeout: Duration) -> ConsumerConfig {
    ConsumerConfig {
        poll_interval: Duration::from_millis(10),
        visibility_timeout,
        ..ConsumerConfig::default()
    }
}

async fn eventually(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn handled_events_are_acknowledged() {
    let queue = InMemoryMessageQueue::new();
    let bus = QueueEventBus::new(queue.clone());
    let events = vec![doc_event(1), doc_event(2)];
    bus.publish_batch(&mut (), &events).await.unwrap();
    assert_eq!(queue.len("doc"), 2);

    let handler = SpyHandler::new(0);
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(queue.clone())
        .handler(handler.clone() as Arc<dyn EventHandler>)
        .config(fast_config(Duration::from_secs(30)))
        .build()
        .start();

    eventually(|| handler.handled().len() == 2 && queue.is_empty("doc")).await;
    assert_eq!(handler.handled(), events);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn failed_handling_is_redelivered_after_visibility_timeout() {
    let queue = InMemoryMessageQueue::new();
    queue
        .send(&mut (), "doc", &serde_json::to_value(doc_event(1)).unwrap())
        .await
        .unwrap();

    let handler = SpyHandler::new(1);
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(queue.clone())
        .handler(handler.clone() as Arc<dyn EventHandler>)
        .config(fast_config(Duration::from_millis(150)))
        .build()
        .start();

    // 首次失败后消息仍在队列中（隐藏）
    eventually(|| handler.calls() == 1).await;
    assert_eq!(queue.len("doc"), 1);

    eventually(|| handler.handled().len() == 1 && queue.is_empty("doc")).await;
    assert_eq!(handler.calls(), 2);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn undecodable_message_moves_to_dead_letter_queue() {
    let queue = InMemoryMessageQueue::new();
    queue
        .send(&mut (), "doc", &json!({"not": "an event"}))
        .await
        .unwrap();

    let handler = SpyHandler::new(0);
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(queue.clone())
        .handler(handler.clone() as Arc<dyn EventHandler>)
        .config(fast_config(Duration::from_secs(30)))
        .build()
        .start();

    eventually(|| queue.len("doc_dlq") == 1 && queue.is_empty("doc")).await;
    assert_eq!(queue.messages("doc_dlq"), vec![json!({"not": "an event"})]);
    assert_eq!(handler.calls(), 0);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn undecodable_message_is_dropped_without_dead_letter_policy() {
    let queue = InMemoryMessageQueue::new();
    queue.send(&mut (), "doc", &json!(42)).await.unwrap();

    let handler = SpyHandler::new(0);
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(queue.clone())
        .handler(handler.clone() as Arc<dyn EventHandler>)
        .config(ConsumerConfig {
            dead_letter: None,
            ..fast_config(Duration::from_secs(30))
        })
        .build()
        .start();

    eventually(|| queue.is_empty("doc")).await;
    assert!(queue.is_empty("doc_dlq"));
    assert_eq!(handler.calls(), 0);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn delivery_limit_moves_poison_message_to_dead_letter_queue() {
    let queue = InMemoryMessageQueue::new();
    queue
        .send(&mut (), "doc", &serde_json::to_value(doc_event(1)).unwrap())
        .await
        .unwrap();

    let handler = SpyHandler::new(usize::MAX);
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(queue.clone())
        .handler(handler.clone() as Arc<dyn EventHandler>)
        .config(ConsumerConfig {
            dead_letter: Some(DeadLetterPolicy {
                queue_suffix: ".dead".to_string(),
                max_deliveries: Some(2),
            }),
            ..fast_config(Duration::from_millis(50))
        })
        .build()
        .start();

    eventually(|| queue.len("doc.dead") == 1 && queue.is_empty("doc")).await;
    assert_eq!(handler.calls(), 2);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn shutdown_stops_tasks_promptly() {
    let handler = SpyHandler::new(0);
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(InMemoryMessageQueue::new())
        .handler(handler as Arc<dyn EventHandler>)
        .config(ConsumerConfig {
            poll_interval: Duration::from_secs(3600),
            ..ConsumerConfig::default()
        })
        .build()
        .start();

    handle.shutdown();
    assert!(handle.is_shutdown());
    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("consumer did not stop");
}

// 每次处理耗时固定，期间消息保持认领状态
struct SlowHandler {
    delay: Duration,
    started: AtomicUsize,
}

#[async_trait]
impl EventHandler for SlowHandler {
    fn handler_name(&self) -> &str {
        "slow"
    }

    fn aggregate_type(&self) -> &str {
        "doc"
    }

    async fn handle(&self, _event: &SerializedEvent) -> anyhow::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[tokio::test]
async fn slow_handler_holds_at_most_one_extra_claim() {
    let queue = InMemoryMessageQueue::new();
    let bus = QueueEventBus::new(queue.clone());
    let events: Vec<_> = (1..=4).map(doc_event).collect();
    bus.publish_batch(&mut (), &events).await.unwrap();

    let handler = Arc::new(SlowHandler {
        delay: Duration::from_secs(2),
        started: AtomicUsize::new(0),
    });
    let handle = EventConsumer::builder()
        .sessions(InMemorySessions)
        .queue(queue.clone())
        .handler(handler.clone() as Arc<dyn EventHandler>)
        .config(fast_config(Duration::from_secs(30)))
        .build()
        .start();

    eventually(|| handler.started.load(Ordering::SeqCst) == 1).await;
    for _ in 0..30 {
        let claimed = queue.len("doc") - queue.visible_len("doc");
        assert!(claimed <= 2, "consumer holds {claimed} claimed messages");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(queue.len("doc"), 4);
    assert_eq!(queue.visible_len("doc"), 2);
    assert_eq!(handler.started.load(Ordering::SeqCst), 1);

    handle.shutdown();
    handle.join().await;
}
