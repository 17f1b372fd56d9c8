//! Row change events and observer registration.
//!
//! Events dispatch synchronously on the frame-ingest task. Observers are
//! registered under a scope (one table and one kind, one table and any
//! kind, or everything) and removed by opaque handle. The registry is
//! mutated under a short lock; dispatch iterates a snapshot so observers
//! can register or deregister from inside a callback without deadlocking.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Row bytes shared between the cache and event consumers.
pub type Row = Arc<[u8]>;

/// A change applied to one row of one table.
#[derive(Debug, Clone)]
pub enum RowEvent {
    /// A row entered the table.
    Insert {
        /// Table the row belongs to.
        table_name: String,
        /// The inserted row bytes.
        row: Row,
    },
    /// A row left the table.
    Delete {
        /// Table the row belonged to.
        table_name: String,
        /// The removed row bytes.
        row: Row,
    },
    /// A row was replaced under the same primary key.
    Update {
        /// Table the row belongs to.
        table_name: String,
        /// The row bytes before the change.
        old_row: Row,
        /// The row bytes after the change.
        new_row: Row,
    },
}

impl RowEvent {
    /// The table this event belongs to.
    pub fn table_name(&self) -> &str {
        match self {
            RowEvent::Insert { table_name, .. }
            | RowEvent::Delete { table_name, .. }
            | RowEvent::Update { table_name, .. } => table_name,
        }
    }
}

/// The event kinds an observer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Row insertions.
    Insert,
    /// Row deletions.
    Delete,
    /// Same-key replacements.
    Update,
}

/// What an observer wants to see.
#[derive(Debug, Clone)]
enum EventScope {
    /// One table, one kind.
    TableKind { table_name: String, kind: EventKind },
    /// One table, every kind.
    Table { table_name: String },
    /// Every table, every kind.
    Global,
}

/// Opaque registration handle; deregistration by handle is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type ObserverFn = Arc<dyn Fn(&RowEvent) + Send + Sync>;

struct Observer {
    handle: ObserverHandle,
    scope: EventScope,
    callback: ObserverFn,
}

impl Clone for Observer {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            scope: self.scope.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Scoped observer registry with snapshot-based dispatch.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Mutex<Vec<Observer>>,
    next_handle: AtomicU64,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn register(&self, scope: EventScope, callback: ObserverFn) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push(Observer {
            handle,
            scope,
            callback,
        });
        handle
    }

    pub(crate) fn register_table_kind(
        &self,
        table_name: impl Into<String>,
        kind: EventKind,
        callback: ObserverFn,
    ) -> ObserverHandle {
        self.register(
            EventScope::TableKind {
                table_name: table_name.into(),
                kind,
            },
            callback,
        )
    }

    pub(crate) fn register_table(&self, table_name: impl Into<String>, callback: ObserverFn) -> ObserverHandle {
        self.register(
            EventScope::Table {
                table_name: table_name.into(),
            },
            callback,
        )
    }

    pub(crate) fn register_global(&self, callback: ObserverFn) -> ObserverHandle {
        self.register(EventScope::Global, callback)
    }

    /// Remove an observer. Unknown handles are ignored.
    pub(crate) fn deregister(&self, handle: ObserverHandle) {
        self.observers.lock().retain(|observer| observer.handle != handle);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }

    /// Dispatch one event to every observer whose scope matches.
    ///
    /// `legacy_per_kind` additionally synthesizes insert and delete
    /// deliveries for update events, for observers that predate the
    /// update kind.
    pub(crate) fn dispatch(&self, event: &RowEvent, legacy_per_kind: bool) {
        let snapshot: Vec<Observer> = self.observers.lock().clone();
        let event_kind = match event {
            RowEvent::Insert { .. } => EventKind::Insert,
            RowEvent::Delete { .. } => EventKind::Delete,
            RowEvent::Update { .. } => EventKind::Update,
        };
        for observer in &snapshot {
            if scope_matches(&observer.scope, event.table_name(), event_kind) {
                (observer.callback)(event);
            }
        }
        if legacy_per_kind
            && let RowEvent::Update {
                table_name,
                old_row,
                new_row,
            } = event
        {
            let synthesized_insert = RowEvent::Insert {
                table_name: table_name.clone(),
                row: Arc::clone(new_row),
            };
            let synthesized_delete = RowEvent::Delete {
                table_name: table_name.clone(),
                row: Arc::clone(old_row),
            };
            for observer in &snapshot {
                // Only kind-specific observers get the synthesized pair;
                // table-wide and global observers already saw the update.
                if let EventScope::TableKind { table_name: t, kind } = &observer.scope {
                    if t != table_name {
                        continue;
                    }
                    match kind {
                        EventKind::Insert => (observer.callback)(&synthesized_insert),
                        EventKind::Delete => (observer.callback)(&synthesized_delete),
                        EventKind::Update => {}
                    }
                }
            }
        }
    }
}

fn scope_matches(scope: &EventScope, table_name: &str, kind: EventKind) -> bool {
    match scope {
        EventScope::TableKind {
            table_name: t,
            kind: k,
        } => t == table_name && *k == kind,
        EventScope::Table { table_name: t } => t == table_name,
        EventScope::Global => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(counter: Arc<AtomicUsize>) -> ObserverFn {
        Arc::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn insert_event(table: &str) -> RowEvent {
        RowEvent::Insert {
            table_name: table.to_string(),
            row: Arc::from(&[1u8][..]),
        }
    }

    fn update_event(table: &str) -> RowEvent {
        RowEvent::Update {
            table_name: table.to_string(),
            old_row: Arc::from(&[1u8][..]),
            new_row: Arc::from(&[2u8][..]),
        }
    }

    #[test]
    fn kind_scope_only_sees_its_kind() {
        let registry = ObserverRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.register_table_kind("t", EventKind::Insert, counting_callback(Arc::clone(&hits)));
        registry.dispatch(&insert_event("t"), false);
        registry.dispatch(&update_event("t"), false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn table_scope_sees_every_kind_for_its_table_only() {
        let registry = ObserverRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.register_table("t", counting_callback(Arc::clone(&hits)));
        registry.dispatch(&insert_event("t"), false);
        registry.dispatch(&update_event("t"), false);
        registry.dispatch(&insert_event("other"), false);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn global_scope_sees_everything() {
        let registry = ObserverRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.register_global(counting_callback(Arc::clone(&hits)));
        registry.dispatch(&insert_event("a"), false);
        registry.dispatch(&update_event("b"), false);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn update_does_not_reach_per_kind_observers_by_default() {
        let registry = ObserverRegistry::new();
        let inserts = Arc::new(AtomicUsize::new(0));
        let deletes = Arc::new(AtomicUsize::new(0));
        registry.register_table_kind("t", EventKind::Insert, counting_callback(Arc::clone(&inserts)));
        registry.register_table_kind("t", EventKind::Delete, counting_callback(Arc::clone(&deletes)));
        registry.dispatch(&update_event("t"), false);
        assert_eq!(inserts.load(Ordering::SeqCst), 0);
        assert_eq!(deletes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn legacy_dispatch_synthesizes_per_kind_pair() {
        let registry = ObserverRegistry::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_insert = Arc::clone(&seen);
        registry.register_table_kind(
            "t",
            EventKind::Insert,
            Arc::new(move |event| {
                if let RowEvent::Insert { row, .. } = event {
                    seen_insert.lock().push(format!("insert:{:?}", row));
                }
            }),
        );
        let seen_delete = Arc::clone(&seen);
        registry.register_table_kind(
            "t",
            EventKind::Delete,
            Arc::new(move |event| {
                if let RowEvent::Delete { row, .. } = event {
                    seen_delete.lock().push(format!("delete:{:?}", row));
                }
            }),
        );
        registry.dispatch(&update_event("t"), true);
        let log = seen.lock();
        assert_eq!(log.len(), 2);
        assert!(log.iter().any(|entry| entry.starts_with("insert:")));
        assert!(log.iter().any(|entry| entry.starts_with("delete:")));
    }

    #[test]
    fn deregistration_is_idempotent_and_safe_during_dispatch() {
        let registry = Arc::new(ObserverRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = registry.register_global(counting_callback(Arc::clone(&hits)));
        registry.deregister(handle);
        registry.deregister(handle);
        assert!(registry.is_empty());

        // An observer that deregisters itself mid-dispatch must not deadlock.
        let registry_inner = Arc::clone(&registry);
        let self_handle = Arc::new(Mutex::new(None::<ObserverHandle>));
        let self_handle_inner = Arc::clone(&self_handle);
        let handle = registry.register_global(Arc::new(move |_event| {
            if let Some(h) = *self_handle_inner.lock() {
                registry_inner.deregister(h);
            }
        }));
        *self_handle.lock() = Some(handle);
        registry.dispatch(&insert_event("t"), false);
        assert!(registry.is_empty());
    }
}
