//! Per-table view over the client cache.
//!
//! A [`TableHandle`] names one table of one cache and bundles the reads
//! and observer registrations generated bindings need, so callers do not
//! thread the table name through every call. Handles are cheap; they hold
//! the cache by `Arc` and can outlive the connection that produced them.

use crate::cache::ClientCache;
use crate::events::ObserverHandle;
use crate::events::Row;
use crate::events::RowEvent;
use crate::pk::PrimaryKeyExtractor;
use std::sync::Arc;
use vireo_proto::TableId;

/// A named table within a session's cache.
#[derive(Clone)]
pub struct TableHandle {
    cache: Arc<ClientCache>,
    table_name: String,
}

impl TableHandle {
    pub(crate) fn new(cache: Arc<ClientCache>, table_name: String) -> Self {
        cache.touch_table(table_name.clone());
        Self { cache, table_name }
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// The server-assigned table id, once an update has carried one.
    pub fn table_id(&self) -> Option<TableId> {
        self.cache.table_id(&self.table_name)
    }

    /// Number of cached rows.
    pub fn count(&self) -> usize {
        self.cache.row_count(&self.table_name)
    }

    /// Look up a row by primary key.
    pub fn get(&self, key: &[u8]) -> Option<Row> {
        self.cache.get_row(&self.table_name, key)
    }

    /// Snapshot of every cached row.
    pub fn rows(&self) -> Vec<Row> {
        self.cache.rows(&self.table_name)
    }

    /// Register (or replace) this table's primary-key extractor.
    pub fn set_primary_key_extractor(&self, extractor: PrimaryKeyExtractor) {
        self.cache.register_extractor(self.table_name.clone(), extractor);
    }

    /// Observe inserts on this table.
    pub fn on_insert(&self, callback: impl Fn(&RowEvent) + Send + Sync + 'static) -> ObserverHandle {
        self.cache.on_insert(self.table_name.clone(), callback)
    }

    /// Observe deletes on this table.
    pub fn on_delete(&self, callback: impl Fn(&RowEvent) + Send + Sync + 'static) -> ObserverHandle {
        self.cache.on_delete(self.table_name.clone(), callback)
    }

    /// Observe same-key replacements on this table.
    pub fn on_update(&self, callback: impl Fn(&RowEvent) + Send + Sync + 'static) -> ObserverHandle {
        self.cache.on_update(self.table_name.clone(), callback)
    }

    /// Observe every event on this table.
    pub fn on_event(&self, callback: impl Fn(&RowEvent) + Send + Sync + 'static) -> ObserverHandle {
        self.cache.on_table_event(self.table_name.clone(), callback)
    }

    /// Remove an observer registered through this (or any) handle.
    pub fn remove_observer(&self, handle: ObserverHandle) {
        self.cache.remove_observer(handle);
    }
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("table_name", &self.table_name)
            .field("rows", &self.count())
            .finish()
    }
}
