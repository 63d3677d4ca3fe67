//! Recent-events journal.
//!
//! Topology events arrive on the channel fed by `ChannelEventSink`. The
//! journal keeps the newest `capacity` of them in memory so operators can
//! list, acknowledge and resolve them. Each event is also logged at a level
//! matching its severity.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use topowatch_core::event::{EventKind, TopologyEvent};
use topowatch_core::metrics as m;
use topowatch_core::types::Severity;

/// Default number of events retained.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

/// Filter for [`EventJournal::list`].
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events at or above this severity.
    pub min_severity: Option<Severity>,
    /// Only events of this kind.
    pub kind: Option<EventKind>,
    /// Skip resolved events.
    pub unresolved_only: bool,
    /// Return at most this many (newest first).
    pub limit: Option<usize>,
}

impl EventFilter {
    fn matches(&self, event: &TopologyEvent) -> bool {
        self.min_severity.is_none_or(|min| event.severity >= min)
            && self.kind.is_none_or(|kind| event.kind == kind)
            && !(self.unresolved_only && event.resolved)
    }
}

/// Journal counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JournalStats {
    /// Events currently held.
    pub retained: usize,
    /// Events evicted because the journal was full.
    pub evicted: u64,
    /// Retained events not yet acknowledged.
    pub unacknowledged: usize,
    /// Retained events not yet resolved.
    pub unresolved: usize,
}

/// Bounded in-memory journal of topology events.
pub struct EventJournal {
    capacity: usize,
    inner: Mutex<JournalInner>,
}

#[derive(Default)]
struct JournalInner {
    events: VecDeque<TopologyEvent>,
    evicted: u64,
}

impl EventJournal {
    /// Create a journal holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(JournalInner::default()),
        }
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest when full.
    pub fn record(&self, event: TopologyEvent) {
        metrics::counter!(m::DAEMON_EVENTS_TOTAL, m::LABEL_KIND => event.kind.as_str())
            .increment(1);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.events.len() == self.capacity {
            inner.events.pop_front();
            inner.evicted += 1;
        }
        inner.events.push_back(event);
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_EVENTS_RETAINED).set(inner.events.len() as f64);
    }

    /// List matching events, newest first.
    pub fn list(&self, filter: &EventFilter) -> Vec<TopologyEvent> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .events
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Look up one event by id.
    pub fn get(&self, id: &str) -> Option<TopologyEvent> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.events.iter().find(|e| e.id == id).cloned()
    }

    /// Mark an event acknowledged. Returns `false` if it is not retained.
    pub fn acknowledge(&self, id: &str) -> bool {
        self.update(id, |e| e.acknowledged = true)
    }

    /// Mark an event resolved (and acknowledged). Returns `false` if it is not retained.
    pub fn resolve(&self, id: &str) -> bool {
        self.update(id, |e| {
            e.acknowledged = true;
            e.resolved = true;
        })
    }

    /// Current counters.
    pub fn stats(&self) -> JournalStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        JournalStats {
            retained: inner.events.len(),
            evicted: inner.evicted,
            unacknowledged: inner.events.iter().filter(|e| !e.acknowledged).count(),
            unresolved: inner.events.iter().filter(|e| !e.resolved).count(),
        }
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut TopologyEvent)) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                f(event);
                true
            }
            None => false,
        }
    }
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNAL_CAPACITY)
    }
}

fn log_event(event: &TopologyEvent) {
    let device_id = event.device_id.as_ref().map(|d| d.as_str()).unwrap_or("-");
    let link_id = event.link_id.as_deref().unwrap_or("-");
    match event.severity {
        Severity::Info => tracing::info!(
            event_id = %event.id, kind = %event.kind, device_id, link_id,
            "{}", event.message
        ),
        Severity::Warning => tracing::warn!(
            event_id = %event.id, kind = %event.kind, device_id, link_id,
            "{}", event.message
        ),
        Severity::Error | Severity::Critical => tracing::error!(
            event_id = %event.id, kind = %event.kind, severity = %event.severity,
            device_id, link_id, "{}", event.message
        ),
    }
}

/// Spawn the task moving events from the channel into the journal.
///
/// On cancellation, events already queued are drained before the task exits.
pub fn spawn_event_journal(
    mut rx: mpsc::Receiver<TopologyEvent>,
    journal: Arc<EventJournal>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let mut drained = 0usize;
                    while let Ok(event) = rx.try_recv() {
                        log_event(&event);
                        journal.record(event);
                        drained += 1;
                    }
                    tracing::debug!(drained, "event journal shutting down");
                    break;
                }
                received = rx.recv() => match received {
                    Some(event) => {
                        log_event(&event);
                        journal.record(event);
                    }
                    None => {
                        tracing::debug!("event channel closed, exiting journal task");
                        break;
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use topowatch_core::types::DeviceId;

    fn event(kind: EventKind) -> TopologyEvent {
        TopologyEvent::new("test", kind, format!("{kind} happened"))
    }

    #[test]
    fn evicts_oldest_when_full() {
        let journal = EventJournal::new(2);
        let first = event(EventKind::LinkDown);
        let first_id = first.id.clone();
        journal.record(first);
        journal.record(event(EventKind::LinkStale));
        journal.record(event(EventKind::GraphConflict));

        let stats = journal.stats();
        assert_eq!(stats.retained, 2);
        assert_eq!(stats.evicted, 1);
        assert!(journal.get(&first_id).is_none());
        let kinds: Vec<EventKind> = journal
            .list(&EventFilter::default())
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, [EventKind::GraphConflict, EventKind::LinkStale]);
    }

    #[test]
    fn filters_by_severity_kind_and_resolution() {
        let journal = EventJournal::default();
        journal.record(event(EventKind::AdapterFailure).for_device(DeviceId::new("sw1")));
        let conflict = event(EventKind::GraphConflict);
        let conflict_id = conflict.id.clone();
        journal.record(conflict);
        journal.record(event(EventKind::StoreCorruption));

        let errors = journal.list(&EventFilter {
            min_severity: Some(Severity::Error),
            ..EventFilter::default()
        });
        assert_eq!(errors.len(), 2);

        assert!(journal.resolve(&conflict_id));
        let open = journal.list(&EventFilter {
            min_severity: Some(Severity::Error),
            unresolved_only: true,
            ..EventFilter::default()
        });
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kind, EventKind::StoreCorruption);

        let adapter = journal.list(&EventFilter {
            kind: Some(EventKind::AdapterFailure),
            limit: Some(5),
            ..EventFilter::default()
        });
        assert_eq!(adapter.len(), 1);
    }

    #[test]
    fn acknowledge_and_resolve_flags() {
        let journal = EventJournal::default();
        let e = event(EventKind::IdentityUnresolved);
        let id = e.id.clone();
        journal.record(e);

        assert!(journal.acknowledge(&id));
        let stored = journal.get(&id).unwrap();
        assert!(stored.acknowledged && !stored.resolved);
        assert!(journal.resolve(&id));
        assert_eq!(journal.stats().unresolved, 0);
        assert!(!journal.acknowledge("no-such-event"));
    }

    #[tokio::test]
    async fn task_drains_queue_on_cancel() {
        let (tx, rx) = mpsc::channel(16);
        let journal = Arc::new(EventJournal::default());
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            tx.send(event(EventKind::LinkStale)).await.unwrap();
        }
        cancel.cancel();
        let task = spawn_event_journal(rx, Arc::clone(&journal), cancel);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(journal.stats().retained, 3);
    }

    #[tokio::test]
    async fn task_exits_when_channel_closes() {
        let (tx, rx) = mpsc::channel(4);
        let journal = Arc::new(EventJournal::default());
        let task = spawn_event_journal(rx, Arc::clone(&journal), CancellationToken::new());
        tx.send(event(EventKind::LinkDown)).await.unwrap();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(journal.stats().retained, 1);
    }
}
