//! 内存版事件/快照仓储
//!
//! 会话类型为 `()`，不具备事务回滚能力；唯一性与版本检查在同一把锁内完成。
//!
use crate::error::{DomainError, DomainResult as Result};
use crate::persist::{EventRepository, SerializedEvent, SerializedSnapshot, SnapshotRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn poisoned(what: &str) -> DomainError {
    DomainError::database(format!("{what} poisoned"))
}

#[derive(Debug, Default)]
struct EventLog {
    next_id: i64,
    events: Vec<SerializedEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryEventRepository {
    inner: Arc<Mutex<EventLog>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> Result<MutexGuard<'_, EventLog>> {
        self.inner.lock().map_err(|_| poisoned("event log"))
    }

    /// 全部已存储事件（按写入顺序）
    pub fn all(&self) -> Vec<SerializedEvent> {
        self.log().map(|l| l.events.clone()).unwrap_or_default()
    }

    fn sorted_for(log: &EventLog, aggregate_id: &str, after: usize) -> Vec<SerializedEvent> {
        let mut found: Vec<SerializedEvent> = log
            .events
            .iter()
            .filter(|e| e.aggregate_id() == aggregate_id && e.version() > after)
            .cloned()
            .collect();
        found.sort_by_key(SerializedEvent::version);
        found
    }

    fn last_version(log: &EventLog, aggregate_id: &str) -> usize {
        log.events
            .iter()
            .filter(|e| e.aggregate_id() == aggregate_id)
            .map(SerializedEvent::version)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    type Session = ();

    async fn find_by_aggregate_id(
        &self,
        _session: &mut (),
        aggregate_id: &str,
    ) -> Result<Vec<SerializedEvent>> {
        Ok(Self::sorted_for(&*self.log()?, aggregate_id, 0))
    }

    async fn find_after_version(
        &self,
        _session: &mut (),
        aggregate_id: &str,
        version: usize,
    ) -> Result<Vec<SerializedEvent>> {
        Ok(Self::sorted_for(&*self.log()?, aggregate_id, version))
    }

    async fn exists(&self, _session: &mut (), aggregate_id: &str) -> Result<bool> {
        Ok(self
            .log()?
            .events
            .iter()
            .any(|e| e.aggregate_id() == aggregate_id))
    }

    async fn last_version_for_update(&self, _session: &mut (), aggregate_id: &str) -> Result<usize> {
        Ok(Self::last_version(&*self.log()?, aggregate_id))
    }

    async fn append(
        &self,
        _session: &mut (),
        events: Vec<SerializedEvent>,
    ) -> Result<Vec<SerializedEvent>> {
        let mut log = self.log()?;

        for (i, event) in events.iter().enumerate() {
            let taken = log
                .events
                .iter()
                .chain(events[..i].iter())
                .any(|e| e.aggregate_id() == event.aggregate_id() && e.version() == event.version());
            if taken {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: event.aggregate_id().to_string(),
                    expected: event.version().saturating_sub(1),
                    actual: Some(Self::last_version(&log, event.aggregate_id())),
                });
            }
        }

        let mut stored = Vec::with_capacity(events.len());
        for event in events {
            log.next_id += 1;
            let event = event.with_id(log.next_id);
            log.events.push(event.clone());
            stored.push(event);
        }
        Ok(stored)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotRepository {
    inner: Arc<Mutex<HashMap<String, SerializedSnapshot>>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aggregate_id: &str) -> Option<SerializedSnapshot> {
        self.inner
            .lock()
            .ok()
            .and_then(|m| m.get(aggregate_id).cloned())
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    type Session = ();

    async fn find(
        &self,
        _session: &mut (),
        aggregate_id: &str,
    ) -> Result<Option<SerializedSnapshot>> {
        let snapshots = self.inner.lock().map_err(|_| poisoned("snapshots"))?;
        Ok(snapshots.get(aggregate_id).cloned())
    }

    async fn upsert(&self, _session: &mut (), snapshot: SerializedSnapshot) -> Result<()> {
        let mut snapshots = self.inner.lock().map_err(|_| poisoned("snapshots"))?;
        snapshots.insert(snapshot.aggregate_id().to_string(), snapshot);
        Ok(())
    }
}
