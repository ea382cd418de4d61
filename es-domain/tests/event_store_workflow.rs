use async_trait::async_trait;
use es_domain::aggregate::{Aggregate, EventSourced};
use es_domain::domain_event::EventContext;
use es_domain::entity::Entity;
use es_domain::error::{DomainError, DomainResult};
use es_domain::eventing::{InMemoryMessageQueue, QueueEventBus};
use es_domain::persist::{
    AggregateStore, EventRepository, EventStore, InMemoryEventRepository,
    InMemorySnapshotRepository, SerializedEvent, SerializedSnapshot, SnapshotRepository,
    event_context,
};
use es_macros::{aggregate, event};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
enum DocError {
    #[error("field not found: {0}")]
    FieldNotFound(String),
}

#[event]
enum DocEvent {
    #[event(event_type = "DOC_CREATED_V1")]
    Created { fields: BTreeMap<String, Value> },
    #[event(event_type = "DOC_FIELD_SET_V1")]
    FieldSet { name: String, value: Value },
}

#[aggregate(event = DocEvent)]
struct Doc {
    fields: BTreeMap<String, Value>,
}

impl Aggregate for Doc {
    const TYPE: &'static str = "doc";
    type Error = DocError;

    fn when(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            DocEvent::Created { fields } => self.fields = fields.clone(),
            DocEvent::FieldSet { name, value } => {
                let slot = self
                    .fields
                    .get_mut(name)
                    .ok_or_else(|| DocError::FieldNotFound(name.clone()))?;
                *slot = value.clone();
            }
        }
        Ok(())
    }
}

// 统计事件仓储读取次数与读出的事件数
#[derive(Clone, Default)]
struct CountingEventRepo {
    inner: InMemoryEventRepository,
    full_reads: Arc<Mutex<usize>>,
    tail_reads: Arc<Mutex<usize>>,
    events_read: Arc<Mutex<usize>>,
}

#[async_trait]
impl EventRepository for CountingEventRepo {
    type Session = ();

    async fn find_by_aggregate_id(
        &self,
        session: &mut (),
        aggregate_id: &str,
    ) -> DomainResult<Vec<SerializedEvent>> {
        *self.full_reads.lock().unwrap() += 1;
        let found = self.inner.find_by_aggregate_id(session, aggregate_id).await?;
        *self.events_read.lock().unwrap() += found.len();
        Ok(found)
    }

    async fn find_after_version(
        &self,
        session: &mut (),
        aggregate_id: &str,
        version: usize,
    ) -> DomainResult<Vec<SerializedEvent>> {
        *self.tail_reads.lock().unwrap() += 1;
        let found = self
            .inner
            .find_after_version(session, aggregate_id, version)
            .await?;
        *self.events_read.lock().unwrap() += found.len();
        Ok(found)
    }

    async fn exists(&self, session: &mut (), aggregate_id: &str) -> DomainResult<bool> {
        self.inner.exists(session, aggregate_id).await
    }

    async fn last_version_for_update(
        &self,
        session: &mut (),
        aggregate_id: &str,
    ) -> DomainResult<usize> {
        self.inner.last_version_for_update(session, aggregate_id).await
    }

    async fn append(
        &self,
        session: &mut (),
        events: Vec<SerializedEvent>,
    ) -> DomainResult<Vec<SerializedEvent>> {
        self.inner.append(session, events).await
    }
}

// 记录快照写入时的版本
#[derive(Clone, Default)]
struct RecordingSnapshotRepo {
    inner: InMemorySnapshotRepository,
    written: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl SnapshotRepository for RecordingSnapshotRepo {
    type Session = ();

    async fn find(
        &self,
        session: &mut (),
        aggregate_id: &str,
    ) -> DomainResult<Option<SerializedSnapshot>> {
        self.inner.find(session, aggregate_id).await
    }

    async fn upsert(&self, session: &mut (), snapshot: SerializedSnapshot) -> DomainResult<()> {
        self.written.lock().unwrap().push(snapshot.version());
        self.inner.upsert(session, snapshot).await
    }
}

type Store = EventStore<CountingEventRepo, RecordingSnapshotRepo, QueueEventBus<InMemoryMessageQueue>>;

struct Fixture {
    events: CountingEventRepo,
    snapshots: RecordingSnapshotRepo,
    queue: InMemoryMessageQueue,
    store: Store,
}

fn fixture() -> Fixture {
    let events = CountingEventRepo::default();
    let snapshots = RecordingSnapshotRepo::default();
    let queue = InMemoryMessageQueue::new();
    let store = EventStore::new(
        events.clone(),
        snapshots.clone(),
        QueueEventBus::new(queue.clone()),
    );
    Fixture {
        events,
        snapshots,
        queue,
        store,
    }
}

fn set(name: &str, value: Value) -> DocEvent {
    DocEvent::FieldSet {
        name: name.to_string(),
        value,
    }
}

async fn create(store: &Store, id: &str) -> Doc {
    let mut doc = Doc::new(id.to_string(), "T1".to_string());
    let fields = BTreeMap::from([("name".to_string(), json!("x"))]);
    doc.apply_new(DocEvent::Created { fields }).unwrap();
    store.save(&mut (), &doc).await.unwrap();
    doc.clear_changes();
    doc
}

#[tokio::test]
async fn create_update_snapshot_and_reload_from_snapshot() {
    let fx = fixture();

    let mut doc = create(&fx.store, "A1").await;
    assert_eq!(doc.version(), 1);
    assert_eq!(fx.events.inner.all().len(), 1);
    assert!(fx.snapshots.inner.get("A1").is_none());

    for i in 1..=4 {
        doc.apply_new(set("name", json!(format!("x{i}")))).unwrap();
        fx.store.save(&mut (), &doc).await.unwrap();
        doc.clear_changes();
    }
    assert_eq!(doc.version(), 5);

    let snapshot = fx.snapshots.inner.get("A1").expect("snapshot at version 5");
    assert_eq!(snapshot.version(), 5);
    assert_eq!(snapshot.tenant_id(), "T1");

    // 全新加载：来自快照，不逐条重放 1..=5
    let mut fresh = Doc::new("A1".to_string(), "T1".to_string());
    fx.store.load(&mut (), &mut fresh).await.unwrap();

    assert_eq!(fresh.version(), 5);
    assert_eq!(fresh.fields["name"], json!("x4"));
    assert!(fresh.changes().is_empty());
    assert_eq!(*fx.events.full_reads.lock().unwrap(), 0);
    assert_eq!(*fx.events.tail_reads.lock().unwrap(), 1);
    assert_eq!(*fx.events.events_read.lock().unwrap(), 0);
}

#[tokio::test]
async fn snapshot_written_only_on_cadence_multiples() {
    let fx = fixture();
    let mut doc = create(&fx.store, "A2").await;

    for i in 2..=15 {
        doc.apply_new(set("name", json!(i))).unwrap();
        fx.store.save(&mut (), &doc).await.unwrap();
        doc.clear_changes();
    }

    assert_eq!(*fx.snapshots.written.lock().unwrap(), vec![5, 10, 15]);
}

#[tokio::test]
async fn snapshot_load_equals_full_replay() {
    let fx = fixture();
    let mut doc = create(&fx.store, "A3").await;
    for i in 2..=7 {
        doc.apply_new(set("name", json!(i))).unwrap();
        fx.store.save(&mut (), &doc).await.unwrap();
        doc.clear_changes();
    }

    let mut via_snapshot = Doc::new("A3".to_string(), "T1".to_string());
    fx.store.load(&mut (), &mut via_snapshot).await.unwrap();
    assert_eq!(*fx.events.events_read.lock().unwrap(), 2);

    // 不使用快照的折叠结果
    let no_snapshots = EventStore::new(
        fx.events.inner.clone(),
        InMemorySnapshotRepository::new(),
        QueueEventBus::new(InMemoryMessageQueue::new()),
    );
    let mut via_replay = Doc::new("A3".to_string(), "T1".to_string());
    no_snapshots.load(&mut (), &mut via_replay).await.unwrap();

    assert_eq!(via_snapshot.version(), 7);
    assert_eq!(via_replay.version(), 7);
    assert_eq!(via_snapshot.fields, via_replay.fields);
    assert_eq!(via_snapshot.tenant_id(), via_replay.tenant_id());
}

#[tokio::test]
async fn stale_copy_fails_with_concurrency_conflict() {
    let fx = fixture();
    let mut doc = create(&fx.store, "A4").await;
    for i in 2..=5 {
        doc.apply_new(set("name", json!(i))).unwrap();
        fx.store.save(&mut (), &doc).await.unwrap();
        doc.clear_changes();
    }

    let mut copy1 = Doc::new("A4".to_string(), "T1".to_string());
    let mut copy2 = Doc::new("A4".to_string(), "T1".to_string());
    fx.store.load(&mut (), &mut copy1).await.unwrap();
    fx.store.load(&mut (), &mut copy2).await.unwrap();
    assert_eq!(copy1.version(), 5);
    assert_eq!(copy2.version(), 5);

    copy1.apply_new(set("name", json!("one"))).unwrap();
    fx.store.save(&mut (), &copy1).await.unwrap();
    assert_eq!(copy1.version(), 6);

    copy2.apply_new(set("name", json!("two"))).unwrap();
    let err = fx.store.save(&mut (), &copy2).await.unwrap_err();
    match err {
        DomainError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        } => {
            assert_eq!(aggregate_id, "A4");
            assert_eq!(expected, 5);
            assert_eq!(actual, Some(6));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(fx.events.inner.all().len(), 6);
}

#[tokio::test]
async fn concurrent_saves_from_same_version_admit_exactly_one() {
    let fx = Arc::new(fixture());
    let mut base = create(&fx.store, "A5").await;
    base.apply_new(set("name", json!(2))).unwrap();
    fx.store.save(&mut (), &base).await.unwrap();
    base.clear_changes();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let fx = fx.clone();
        let mut copy = base.clone();
        tasks.push(tokio::spawn(async move {
            copy.apply_new(set("name", json!(format!("w{i}")))).unwrap();
            fx.store.save(&mut (), &copy).await
        }));
    }

    let mut ok = 0;
    let mut conflicts = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => ok += 1,
            Err(DomainError::ConcurrencyConflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn save_without_changes_is_noop_and_exists_tracks_events() {
    let fx = fixture();
    let blank = Doc::new("A6".to_string(), "T1".to_string());
    assert!(fx.store.save(&mut (), &blank).await.unwrap().is_empty());
    assert!(!fx.store.exists(&mut (), "A6").await.unwrap());
    assert!(fx.queue.is_empty("doc"));

    create(&fx.store, "A6").await;
    assert!(fx.store.exists(&mut (), "A6").await.unwrap());
}

#[tokio::test]
async fn multi_event_commit_numbers_versions_and_publishes_in_order() {
    let fx = fixture();
    let mut doc = Doc::new("A7".to_string(), "T1".to_string());
    doc.apply_new(DocEvent::Created {
        fields: BTreeMap::from([("a".to_string(), json!(0))]),
    })
    .unwrap();
    doc.apply_new(set("a", json!(1))).unwrap();
    doc.apply_new(set("a", json!(2))).unwrap();

    let ctx = EventContext::builder()
        .correlation_id("req-1".to_string())
        .build();
    let stored = fx
        .store
        .save_with_context(&mut (), &doc, Some(&ctx))
        .await
        .unwrap();

    // 聚合自身的未提交事件由调用方清理
    assert_eq!(doc.changes().len(), 3);
    assert_eq!(
        stored.iter().map(SerializedEvent::version).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(stored.iter().all(|e| e.id().is_some()));
    assert_eq!(event_context(&stored[0]).unwrap(), Some(ctx));

    let published: Vec<SerializedEvent> = fx
        .queue
        .messages("doc")
        .into_iter()
        .map(|m| serde_json::from_value(m).unwrap())
        .collect();
    assert_eq!(published, stored);
}

#[tokio::test]
async fn rejected_event_leaves_store_untouched() {
    let fx = fixture();
    let mut doc = create(&fx.store, "A8").await;

    let err = doc.apply_new(set("missing", json!(1))).unwrap_err();
    assert!(matches!(err, DomainError::DomainRuleViolation { .. }));
    assert!(fx.store.save(&mut (), &doc).await.unwrap().is_empty());
    assert_eq!(fx.events.inner.all().len(), 1);
}

#[tokio::test]
async fn foreign_event_type_in_history_is_unknown() {
    let fx = fixture();
    let foreign = SerializedEvent::builder()
        .aggregate_id("A9".to_string())
        .tenant_id("T1".to_string())
        .aggregate_type("doc".to_string())
        .event_type("DOC_ARCHIVED_V9".to_string())
        .data(json!({}))
        .version(1)
        .build();
    fx.events.inner.append(&mut (), vec![foreign]).await.unwrap();

    let mut doc = Doc::new("A9".to_string(), "T1".to_string());
    let err = fx.store.load(&mut (), &mut doc).await.unwrap_err();
    match err {
        DomainError::UnknownEventType {
            aggregate_type,
            event_type,
        } => {
            assert_eq!(aggregate_type, "doc");
            assert_eq!(event_type, "DOC_ARCHIVED_V9");
        }
        other => panic!("unexpected {other:?}"),
    }
}
