//! Subscription handles and the active-subscription registry.
//!
//! A handle identifies one applied subscription for the lifetime of a
//! session. The registry's contents drive replay after reconnection: the
//! union of every active handle's queries is re-sent as one batch
//! subscribe.

use parking_lot::Mutex;
use std::collections::HashMap;
use vireo_proto::QueryId;

/// How a subscription was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Batch `Subscribe`: replaces the server-side query set.
    Batch,
    /// `SubscribeSingle`: adds one query to the set.
    Single,
    /// `SubscribeMulti`: adds a query group to the set.
    Multi,
}

/// An applied subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    request_id: u32,
    kind: SubscriptionKind,
    query_id: Option<QueryId>,
    queries: Vec<String>,
}

impl SubscriptionHandle {
    pub(crate) fn new(request_id: u32, kind: SubscriptionKind, query_id: Option<QueryId>, queries: Vec<String>) -> Self {
        Self {
            request_id,
            kind,
            query_id,
            queries,
        }
    }

    /// The request id that established this subscription.
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// The query-set id, present for single and multi subscriptions.
    pub fn query_id(&self) -> Option<QueryId> {
        self.query_id
    }

    /// The SQL queries this subscription covers.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Whether this was a batch subscribe.
    pub fn is_batched(&self) -> bool {
        self.kind == SubscriptionKind::Batch
    }

    pub(crate) fn kind(&self) -> SubscriptionKind {
        self.kind
    }
}

/// Registry of applied subscriptions, keyed by establishing request id.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    active: Mutex<HashMap<u32, SubscriptionHandle>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, handle: SubscriptionHandle) {
        self.active.lock().insert(handle.request_id, handle);
    }

    pub(crate) fn remove(&self, request_id: u32) -> Option<SubscriptionHandle> {
        self.active.lock().remove(&request_id)
    }

    /// Discard every active handle (server-initiated teardown).
    pub(crate) fn clear(&self) -> usize {
        let mut active = self.active.lock();
        let count = active.len();
        active.clear();
        count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// Union of every active handle's queries, in insertion-agnostic
    /// but deterministic (sorted, deduplicated) order, for replay.
    pub(crate) fn replay_queries(&self) -> Vec<String> {
        let active = self.active.lock();
        let mut queries: Vec<String> = active.values().flat_map(|handle| handle.queries.iter().cloned()).collect();
        queries.sort();
        queries.dedup();
        queries
    }
}
