//! Coherent client-side row cache.
//!
//! One [`ClientCache`] per session maps table names to per-table keyed row
//! storage. The frame-dispatch path is the only writer; application code
//! reads rows and registers observers. Update detection pairs same-key
//! delete+insert rows within one delta into a single update event.
//!
//! Decode failures while applying a delta are logged and the delta is
//! skipped; they never terminate the session.

use crate::events::EventKind;
use crate::events::ObserverHandle;
use crate::events::ObserverRegistry;
use crate::events::Row;
use crate::events::RowEvent;
use crate::pk::PrimaryKeyExtractor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tracing::debug;
use tracing::warn;
use vireo_proto::DatabaseUpdate;
use vireo_proto::QueryUpdate;
use vireo_proto::TableId;
use vireo_proto::TableUpdate;

/// Primary-key bytes extracted from a row.
pub type PrimaryKey = Vec<u8>;

/// Keyed storage for one table.
#[derive(Debug, Default)]
pub struct TableCache {
    /// Server-assigned id, filled in by the first update that carries one.
    table_id: Option<TableId>,
    /// At most one row per primary key.
    rows: HashMap<PrimaryKey, Row>,
}

impl TableCache {
    /// The server-assigned table id, when one has been seen.
    pub fn table_id(&self) -> Option<TableId> {
        self.table_id
    }

    /// Number of cached rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Look up a row by primary key.
    pub fn get(&self, key: &[u8]) -> Option<Row> {
        self.rows.get(key).cloned()
    }

    /// Snapshot of every row.
    pub fn rows(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }
}

/// Counters kept in lockstep with event emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Insert events emitted.
    pub total_inserts: u64,
    /// Delete events emitted.
    pub total_deletes: u64,
    /// Update events emitted.
    pub total_updates: u64,
}

/// All cached tables of one session.
pub struct ClientCache {
    tables: Mutex<HashMap<String, TableCache>>,
    extractors: Mutex<HashMap<String, PrimaryKeyExtractor>>,
    observers: ObserverRegistry,
    /// Opt-in synthesized insert+delete delivery for update events.
    legacy_update_dispatch: AtomicBool,
    total_inserts: AtomicU64,
    total_deletes: AtomicU64,
    total_updates: AtomicU64,
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientCache {
    /// Create an empty cache with no registered extractors.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            extractors: Mutex::new(HashMap::new()),
            observers: ObserverRegistry::new(),
            legacy_update_dispatch: AtomicBool::new(false),
            total_inserts: AtomicU64::new(0),
            total_deletes: AtomicU64::new(0),
            total_updates: AtomicU64::new(0),
        }
    }

    /// Create a cache with a pre-populated extractor map.
    ///
    /// Generated bindings call this with one entry per table so update
    /// detection works from the first delta.
    pub fn with_extractors(extractors: HashMap<String, PrimaryKeyExtractor>) -> Self {
        let cache = Self::new();
        *cache.extractors.lock() = extractors;
        cache
    }

    /// Register (or replace) the primary-key extractor for a table.
    pub fn register_extractor(&self, table_name: impl Into<String>, extractor: PrimaryKeyExtractor) {
        self.extractors.lock().insert(table_name.into(), extractor);
    }

    /// Enable or disable synthesized insert+delete delivery for updates.
    ///
    /// Off by default: an update notifies update-scope observers exactly
    /// once and per-kind insert/delete observers not at all.
    pub fn set_legacy_update_dispatch(&self, enabled: bool) {
        self.legacy_update_dispatch.store(enabled, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Names of every table that has been referenced or updated.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.lock().keys().cloned().collect()
    }

    /// The server-assigned id of a table, when known.
    pub fn table_id(&self, table_name: &str) -> Option<TableId> {
        self.tables.lock().get(table_name).and_then(TableCache::table_id)
    }

    /// Number of cached rows in a table (0 when the table is unknown).
    pub fn row_count(&self, table_name: &str) -> usize {
        self.tables.lock().get(table_name).map_or(0, TableCache::row_count)
    }

    /// Look up a row by primary key.
    pub fn get_row(&self, table_name: &str, key: &[u8]) -> Option<Row> {
        self.tables.lock().get(table_name).and_then(|table| table.get(key))
    }

    /// Snapshot of every row in a table.
    pub fn rows(&self, table_name: &str) -> Vec<Row> {
        self.tables.lock().get(table_name).map_or_else(Vec::new, TableCache::rows)
    }

    /// Ensure a table exists, creating it empty when first referenced.
    pub fn touch_table(&self, table_name: impl Into<String>) {
        self.tables.lock().entry(table_name.into()).or_default();
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_inserts: self.total_inserts.load(Ordering::Relaxed),
            total_deletes: self.total_deletes.load(Ordering::Relaxed),
            total_updates: self.total_updates.load(Ordering::Relaxed),
        }
    }

    // ------------------------------------------------------------------
    // Observer registration
    // ------------------------------------------------------------------

    /// Observe insert events on one table.
    pub fn on_insert(
        &self,
        table_name: impl Into<String>,
        callback: impl Fn(&RowEvent) + Send + Sync + 'static,
    ) -> ObserverHandle {
        self.observers.register_table_kind(table_name, EventKind::Insert, Arc::new(callback))
    }

    /// Observe delete events on one table.
    pub fn on_delete(
        &self,
        table_name: impl Into<String>,
        callback: impl Fn(&RowEvent) + Send + Sync + 'static,
    ) -> ObserverHandle {
        self.observers.register_table_kind(table_name, EventKind::Delete, Arc::new(callback))
    }

    /// Observe update events (same-key replacement) on one table.
    pub fn on_update(
        &self,
        table_name: impl Into<String>,
        callback: impl Fn(&RowEvent) + Send + Sync + 'static,
    ) -> ObserverHandle {
        self.observers.register_table_kind(table_name, EventKind::Update, Arc::new(callback))
    }

    /// Observe every event on one table.
    pub fn on_table_event(
        &self,
        table_name: impl Into<String>,
        callback: impl Fn(&RowEvent) + Send + Sync + 'static,
    ) -> ObserverHandle {
        self.observers.register_table(table_name, Arc::new(callback))
    }

    /// Observe every event on every table.
    pub fn on_any_event(&self, callback: impl Fn(&RowEvent) + Send + Sync + 'static) -> ObserverHandle {
        self.observers.register_global(Arc::new(callback))
    }

    /// Remove an observer; unknown handles are ignored.
    pub fn remove_observer(&self, handle: ObserverHandle) {
        self.observers.deregister(handle);
    }

    // ------------------------------------------------------------------
    // Writes (frame-dispatch path only)
    // ------------------------------------------------------------------

    /// Apply every table update of a transaction, in order.
    ///
    /// Atomic from the cache's perspective: all mutations land before the
    /// next frame is processed (the dispatch path is single-threaded).
    pub fn apply_database_update(&self, update: &DatabaseUpdate) {
        for table_update in &update.tables {
            self.apply_table_update(table_update);
        }
    }

    /// Apply one table's deltas. Undecodable deltas are logged and skipped.
    pub fn apply_table_update(&self, table_update: &TableUpdate) {
        for packed in &table_update.updates {
            match packed.clone().into_query_update() {
                Ok(query_update) => {
                    self.apply_query_update(&table_update.table_name, Some(table_update.table_id), &query_update);
                }
                Err(error) => {
                    warn!(
                        table = %table_update.table_name,
                        error = %error,
                        "skipping undecodable row delta"
                    );
                }
            }
        }
    }

    /// Apply one query's `(deletes, inserts)` delta to a table.
    ///
    /// Inserts are processed first so that a same-key delete+insert pair
    /// within the delta collapses into a single update event; the delete
    /// half of such a pair is suppressed.
    pub fn apply_query_update(&self, table_name: &str, table_id: Option<TableId>, update: &QueryUpdate) {
        let extractor = self
            .extractors
            .lock()
            .get(table_name)
            .copied()
            .unwrap_or(PrimaryKeyExtractor::Identity);

        let mut events: Vec<RowEvent> = Vec::new();
        {
            let mut tables = self.tables.lock();
            let table = tables.entry(table_name.to_string()).or_default();
            if table.table_id.is_none() {
                table.table_id = table_id;
            }

            let mut touched_keys: std::collections::HashSet<PrimaryKey> = std::collections::HashSet::new();
            for row_bytes in update.inserts.iter() {
                let key = extractor.extract(row_bytes).to_vec();
                let row: Row = Arc::from(row_bytes);
                match table.rows.insert(key.clone(), Arc::clone(&row)) {
                    Some(old_row) => events.push(RowEvent::Update {
                        table_name: table_name.to_string(),
                        old_row,
                        new_row: row,
                    }),
                    None => events.push(RowEvent::Insert {
                        table_name: table_name.to_string(),
                        row,
                    }),
                }
                touched_keys.insert(key);
            }

            for row_bytes in update.deletes.iter() {
                let key = extractor.extract(row_bytes);
                if touched_keys.contains(key) {
                    continue;
                }
                if let Some(old_row) = table.rows.remove(key) {
                    events.push(RowEvent::Delete {
                        table_name: table_name.to_string(),
                        row: old_row,
                    });
                }
            }
        }

        if !events.is_empty() {
            debug!(table = %table_name, events = events.len(), "applied row delta");
        }
        let legacy = self.legacy_update_dispatch.load(Ordering::Relaxed);
        for event in &events {
            match event {
                RowEvent::Insert { .. } => self.total_inserts.fetch_add(1, Ordering::Relaxed),
                RowEvent::Delete { .. } => self.total_deletes.fetch_add(1, Ordering::Relaxed),
                RowEvent::Update { .. } => self.total_updates.fetch_add(1, Ordering::Relaxed),
            };
            self.observers.dispatch(event, legacy);
        }
    }

    /// Remove all rows of all tables, keeping table structures, registered
    /// extractors, and observers. Fires no events.
    pub fn clear(&self) {
        let mut tables = self.tables.lock();
        for table in tables.values_mut() {
            table.rows.clear();
        }
    }

    /// Remove tables and statistics. Fires no events.
    pub fn reset(&self) {
        self.tables.lock().clear();
        self.total_inserts.store(0, Ordering::Relaxed);
        self.total_deletes.store(0, Ordering::Relaxed);
        self.total_updates.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("ClientCache")
            .field("tables", &tables.len())
            .field("stats", &self.stats())
            .finish()
    }
}
