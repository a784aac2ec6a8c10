//! In-process task event bus.
//!
//! Synchronous fan-out: `publish` runs every matching subscriber in
//! registration order before it returns. A subscriber that panics is caught
//! and logged so its siblings still see the event. Nothing is buffered; an
//! event published with no subscribers is gone.

use parking_lot::RwLock;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        task_id: TaskId,
        changed_fields: Vec<String>,
        task: Task,
    },
    TaskDeleted {
        task_id: TaskId,
        last_known: Option<Task>,
    },
    TaskCompleted {
        task_id: TaskId,
        completed: bool,
        task: Task,
    },
}

impl TaskEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TaskEvent::TaskCreated { .. } => EventKind::TaskCreated,
            TaskEvent::TaskUpdated { .. } => EventKind::TaskUpdated,
            TaskEvent::TaskDeleted { .. } => EventKind::TaskDeleted,
            TaskEvent::TaskCompleted { .. } => EventKind::TaskCompleted,
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::TaskCreated { task } => task.id,
            TaskEvent::TaskUpdated { task_id, .. }
            | TaskEvent::TaskDeleted { task_id, .. }
            | TaskEvent::TaskCompleted { task_id, .. } => *task_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type EventHandler = Arc<dyn Fn(&TaskEvent) + Send + Sync>;
type ChangeHandler = Arc<dyn Fn(EventKind) + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Kind(EventKind, EventHandler),
    All(EventHandler),
    /// Coalesced "something changed" signal, used for cache invalidation.
    AnyChange(ChangeHandler),
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive events of a single kind.
    pub fn subscribe(
        &self,
        kind: EventKind,
        f: impl Fn(&TaskEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.register(Handler::Kind(kind, Arc::new(f)))
    }

    /// Receive every event.
    pub fn subscribe_all(&self, f: impl Fn(&TaskEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.register(Handler::All(Arc::new(f)))
    }

    /// One notification per published event, whatever its kind.
    pub fn subscribe_any_change(
        &self,
        f: impl Fn(EventKind) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.register(Handler::AnyChange(Arc::new(f)))
    }

    /// Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event`; returns how many subscribers ran without panicking.
    pub fn publish(&self, event: TaskEvent) -> usize {
        let kind = event.kind();
        // Snapshot so subscribers may (un)subscribe while being called.
        let subs: Vec<Subscriber> = self.subscribers.read().clone();

        let mut delivered = 0;
        for sub in subs {
            let outcome = match &sub.handler {
                Handler::Kind(k, f) if *k == kind => catch_unwind(AssertUnwindSafe(|| f(&event))),
                Handler::Kind(..) => continue,
                Handler::All(f) => catch_unwind(AssertUnwindSafe(|| f(&event))),
                Handler::AnyChange(f) => catch_unwind(AssertUnwindSafe(|| f(kind))),
            };
            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    subscription = sub.id.0,
                    kind = ?kind,
                    task_id = event.task_id(),
                    "event subscriber panicked"
                ),
            }
        }

        debug!(kind = ?kind, task_id = event.task_id(), delivered, "published task event");
        delivered
    }

    fn register(&self, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber { id, handler });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn sample_events() -> Vec<TaskEvent> {
        let task = Task::new(1, "water plants");
        vec![
            TaskEvent::TaskCreated { task: task.clone() },
            TaskEvent::TaskUpdated {
                task_id: 1,
                changed_fields: vec!["name".into()],
                task: task.clone(),
            },
            TaskEvent::TaskCompleted {
                task_id: 1,
                completed: true,
                task: task.clone(),
            },
            TaskEvent::TaskDeleted {
                task_id: 1,
                last_known: Some(task),
            },
        ]
    }

    #[test]
    fn any_change_fires_once_per_event_of_every_kind() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe_any_change(move |kind| s.lock().push(kind));

        for ev in sample_events() {
            bus.publish(ev);
        }

        assert_eq!(
            *seen.lock(),
            vec![
                EventKind::TaskCreated,
                EventKind::TaskUpdated,
                EventKind::TaskCompleted,
                EventKind::TaskDeleted,
            ]
        );
    }

    #[test]
    fn kind_subscribers_only_see_their_kind() {
        let bus = EventBus::new();
        let completed = Arc::new(Mutex::new(0));
        let c = completed.clone();
        bus.subscribe(EventKind::TaskCompleted, move |ev| {
            assert_eq!(ev.kind(), EventKind::TaskCompleted);
            *c.lock() += 1;
        });

        for ev in sample_events() {
            bus.publish(ev);
        }
        assert_eq!(*completed.lock(), 1);
    }

    #[test]
    fn delivery_follows_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let o = order.clone();
            bus.subscribe_all(move |_| o.lock().push(i));
        }
        bus.publish(TaskEvent::TaskCreated { task: Task::new(1, "x") });
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_siblings() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));

        let h1 = hits.clone();
        bus.subscribe_all(move |_| *h1.lock() += 1);
        bus.subscribe_all(|_| panic!("subscriber bug"));
        let h2 = hits.clone();
        bus.subscribe_all(move |_| *h2.lock() += 1);

        let delivered = bus.publish(TaskEvent::TaskCreated { task: Task::new(1, "x") });
        assert_eq!(delivered, 2);
        assert_eq!(*hits.lock(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery_and_unsubscribed_events_are_lost() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(TaskEvent::TaskCreated { task: Task::new(1, "x") }), 0);

        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        let id = bus.subscribe_all(move |_| *h.lock() += 1);
        bus.publish(TaskEvent::TaskCreated { task: Task::new(2, "y") });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(TaskEvent::TaskCreated { task: Task::new(3, "z") });

        assert_eq!(*hits.lock(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_may_subscribe_during_delivery() {
        let bus = Arc::new(EventBus::new());
        let b = bus.clone();
        bus.subscribe_all(move |_| {
            b.subscribe_all(|_| {});
        });
        bus.publish(TaskEvent::TaskCreated { task: Task::new(1, "x") });
        assert_eq!(bus.subscriber_count(), 2);
    }
}
