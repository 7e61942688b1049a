//! C2 — Priority Event Queue.
//!
//! A `BinaryHeap` guarded by a mutex, with a manual `Ord` that reorders
//! the heap's default max-heap behavior into the queue's required
//! ordering: priority descending, then due-at ascending, then id
//! ascending for a deterministic tie-break (§4.1). This is the same
//! shape as a discrete-event simulator's `Queued<T>` wrapper: wrap the
//! payload, give it a scheduling key, and let `Ord` encode the
//! reversal so `BinaryHeap::pop` returns "serve next" rather than
//! "largest value".

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use crate::core::types::{CognitiveEvent, EventId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is at capacity")]
    QueueFull,
}

#[derive(Debug, Clone)]
struct QueuedEvent(CognitiveEvent);

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    /// `BinaryHeap` is a max-heap; the event that should be served next
    /// must compare as the greatest. Higher priority wins; among equal
    /// priorities, the earlier due-at wins (reversed so earlier sorts
    /// greater); among equal due-ats, the lower id wins (also reversed).
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.due_at.cmp(&self.0.due_at))
            .then_with(|| other.0.id.cmp(&self.0.id))
    }
}

struct Inner {
    heap: BinaryHeap<QueuedEvent>,
    /// Maps any event id belonging to a recurring series to that
    /// series' original (root) id, so cancelling the root cancels
    /// every future occurrence without touching an in-flight dispatch.
    series_of: HashMap<EventId, EventId>,
    cancelled_series: HashSet<EventId>,
    capacity: usize,
}

/// Thread-safe for concurrent producers and a single consumer (§4.1).
pub struct EventQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl EventQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                series_of: HashMap::new(),
                cancelled_series: HashSet::new(),
                capacity,
            }),
            notify: Notify::new(),
        }
    }

    pub async fn schedule(&self, event: CognitiveEvent) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        if inner.heap.len() >= inner.capacity {
            return Err(QueueError::QueueFull);
        }
        if event.recurring && !inner.series_of.contains_key(&event.id) {
            inner.series_of.insert(event.id, event.id);
        }
        inner.heap.push(QueuedEvent(event));
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    /// Pops every event whose `due_at <= now`, in descending-priority,
    /// ascending-due-at, ascending-id order. Recurring events are
    /// rescheduled automatically unless their series was cancelled.
    ///
    /// `peek`-and-`break` on the heap's root would only ever inspect the
    /// single highest-priority entry; a not-yet-due high-priority event
    /// at the root must not stop lower-priority events that ARE due from
    /// being returned (§4.1). So the whole heap is drained and
    /// partitioned by due time instead of walked from the root.
    pub async fn pop_due(&self, now: DateTime<Utc>) -> Vec<CognitiveEvent> {
        let mut inner = self.inner.lock().await;
        let drained: Vec<QueuedEvent> = inner.heap.drain().collect();
        let mut due = Vec::new();
        let mut pending = Vec::new();

        for QueuedEvent(event) in drained {
            if event.due_at > now {
                pending.push(QueuedEvent(event));
                continue;
            }
            if event.recurring {
                let root = inner.series_of.get(&event.id).copied().unwrap_or(event.id);
                if inner.cancelled_series.contains(&root) {
                    // A cancelled series drops every instance that was
                    // only ever a future reschedule; an in-flight
                    // dispatch (already removed from the heap by an
                    // earlier `pop_due` call) is never affected by this.
                    // The cancelled occurrence itself is dropped too,
                    // not returned as due.
                    continue;
                }
                if let Some(next) = event.next_occurrence(now) {
                    inner.series_of.insert(next.id, root);
                    if pending.len() < inner.capacity {
                        pending.push(QueuedEvent(next));
                    }
                }
            }
            due.push(event);
        }

        inner.heap = pending.into_iter().collect();

        due.sort_by(|a, b| QueuedEvent(b.clone()).cmp(&QueuedEvent(a.clone())));
        due
    }

    /// Best-effort O(n) removal; a no-op if `id` is absent. Cancelling a
    /// recurring event's id cancels the whole series going forward; the
    /// in-flight dispatch (already popped elsewhere) is unaffected.
    pub async fn cancel(&self, id: EventId) -> bool {
        let mut inner = self.inner.lock().await;
        let root = inner.series_of.get(&id).copied().unwrap_or(id);
        inner.cancelled_series.insert(root);

        let before = inner.heap.len();
        let remaining: BinaryHeap<QueuedEvent> =
            inner.heap.drain().filter(|q| q.0.id != id).collect();
        inner.heap = remaining;
        inner.heap.len() != before
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Waits until `schedule` has been called at least once since the
    /// last notification. Used by the tick loop to avoid busy-polling
    /// an empty queue.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EventKind;

    fn event(priority: i32, due_at: DateTime<Utc>) -> CognitiveEvent {
        CognitiveEvent::new(EventKind::Introspection, priority, serde_json::Value::Null).due_at(due_at)
    }

    #[tokio::test]
    async fn higher_priority_dispatched_before_lower_at_same_due_time() {
        let queue = EventQueue::new(16);
        let now = Utc::now();
        let low = event(50, now);
        let high = event(100, now);
        let (low_id, high_id) = (low.id, high.id);
        queue.schedule(low).await.unwrap();
        queue.schedule(high).await.unwrap();

        let due = queue.pop_due(now).await;
        assert_eq!(due[0].id, high_id);
        assert_eq!(due[1].id, low_id);
    }

    #[tokio::test]
    async fn equal_priority_earlier_due_at_first() {
        let queue = EventQueue::new(16);
        let now = Utc::now();
        let later = event(10, now + chrono::Duration::seconds(5));
        let earlier = event(10, now);
        let (later_id, earlier_id) = (later.id, earlier.id);
        queue.schedule(later).await.unwrap();
        queue.schedule(earlier).await.unwrap();

        let due = queue.pop_due(now + chrono::Duration::seconds(5)).await;
        assert_eq!(due[0].id, earlier_id);
        assert_eq!(due[1].id, later_id);
    }

    #[tokio::test]
    async fn schedule_rejects_when_at_capacity() {
        let queue = EventQueue::new(1);
        let now = Utc::now();
        queue.schedule(event(1, now)).await.unwrap();
        assert_eq!(queue.schedule(event(1, now)).await, Err(QueueError::QueueFull));
    }

    #[tokio::test]
    async fn pop_due_excludes_not_yet_due_events() {
        let queue = EventQueue::new(16);
        let now = Utc::now();
        let future = event(1, now + chrono::Duration::seconds(10));
        queue.schedule(future).await.unwrap();
        assert!(queue.pop_due(now).await.is_empty());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_a_silent_no_op() {
        let queue = EventQueue::new(16);
        assert!(!queue.cancel(EventId::new()).await);
    }

    #[tokio::test]
    async fn cancelling_already_cancelled_id_is_a_no_op_success() {
        let queue = EventQueue::new(16);
        let now = Utc::now();
        let e = event(1, now);
        let id = e.id;
        queue.schedule(e).await.unwrap();
        assert!(queue.cancel(id).await);
        assert!(!queue.cancel(id).await);
    }

    #[tokio::test]
    async fn recurring_event_reschedules_after_dispatch() {
        let queue = EventQueue::new(16);
        let now = Utc::now();
        let recurring = event(1, now).recurring_every(std::time::Duration::from_secs(5));
        queue.schedule(recurring).await.unwrap();

        let due = queue.pop_due(now).await;
        assert_eq!(due.len(), 1);
        assert_eq!(queue.len().await, 1);

        let later = now + chrono::Duration::seconds(5);
        let due_again = queue.pop_due(later).await;
        assert_eq!(due_again.len(), 1);
    }

    #[tokio::test]
    async fn cancelling_recurring_series_stops_future_reschedules() {
        let queue = EventQueue::new(16);
        let now = Utc::now();
        let recurring = event(1, now).recurring_every(std::time::Duration::from_secs(5));
        let id = recurring.id;
        queue.schedule(recurring).await.unwrap();

        // The in-flight dispatch completes and reschedules a next
        // occurrence under a new id that still belongs to `id`'s series.
        let due = queue.pop_due(now).await;
        assert_eq!(due.len(), 1);
        assert_eq!(queue.len().await, 1);

        // Cancelling the original series id now prevents any further
        // occurrence, even though the pending entry has a different id.
        queue.cancel(id).await;
        let later = now + chrono::Duration::seconds(5);
        let due_again = queue.pop_due(later).await;
        assert!(due_again.is_empty());
    }

    #[tokio::test]
    async fn a_not_yet_due_high_priority_event_does_not_starve_a_due_low_priority_one() {
        let queue = EventQueue::new(16);
        let now = Utc::now();
        let high_future = event(1000, now + chrono::Duration::seconds(30));
        let low_due = event(1, now);
        let (high_id, low_id) = (high_future.id, low_due.id);
        queue.schedule(high_future).await.unwrap();
        queue.schedule(low_due).await.unwrap();

        let due = queue.pop_due(now).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, low_id);

        // The future high-priority event is still queued, untouched.
        assert_eq!(queue.len().await, 1);
        let due_later = queue.pop_due(now + chrono::Duration::seconds(30)).await;
        assert_eq!(due_later.len(), 1);
        assert_eq!(due_later[0].id, high_id);
    }
}
