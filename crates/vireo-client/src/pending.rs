//! Request correlation: id generation and pending-call registries.
//!
//! Each outbound request carries a monotonically increasing `u32` id and
//! registers a oneshot completion slot. The frame-dispatch path completes
//! slots as matching responses arrive; deadline expiry and disconnect
//! remove them with the appropriate taxonomy error. Every slot has exactly
//! one outcome.

use crate::error::ClientError;
use crate::subscription::SubscriptionHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;
use vireo_atn::TimeDuration;
use vireo_atn::Timestamp;
use vireo_proto::EnergyQuanta;
use vireo_proto::OneOffQueryResponse;

/// Monotonic wrapping `u32` generator for request and query ids.
///
/// Strictly increasing until `u32::MAX`, then wraps to 0 and continues.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU32,
}

impl RequestIdGenerator {
    /// Start a fresh sequence at `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        // 0 is reserved: servers report request_id = 0 for transactions
        // initiated by other clients.
        Self::starting_at(1)
    }
}

/// Successful reducer completion metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerOutcome {
    /// Server-side commit time.
    pub timestamp: Timestamp,
    /// Energy the call consumed.
    pub energy_quanta_used: EnergyQuanta,
    /// Host-side execution time.
    pub total_host_execution_duration: TimeDuration,
}

/// Successful procedure completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureOutcome {
    /// ATN-encoded return value.
    pub value: Vec<u8>,
    /// Server-side completion time.
    pub timestamp: Timestamp,
    /// Host-side execution time.
    pub total_host_execution_duration: TimeDuration,
}

pub(crate) struct PendingReducer {
    pub(crate) name: String,
    pub(crate) started_at: Instant,
    pub(crate) tx: oneshot::Sender<Result<ReducerOutcome, ClientError>>,
}

pub(crate) struct PendingProcedure {
    pub(crate) name: String,
    pub(crate) started_at: Instant,
    pub(crate) tx: oneshot::Sender<Result<ProcedureOutcome, ClientError>>,
}

pub(crate) struct PendingSubscription {
    pub(crate) handle: SubscriptionHandle,
    pub(crate) started_at: Instant,
    pub(crate) tx: oneshot::Sender<Result<(), ClientError>>,
}

pub(crate) struct PendingOneOff {
    pub(crate) started_at: Instant,
    pub(crate) tx: oneshot::Sender<Result<OneOffQueryResponse, ClientError>>,
}

/// The session's pending-call registries.
#[derive(Default)]
pub(crate) struct PendingCalls {
    reducers: Mutex<HashMap<u32, PendingReducer>>,
    procedures: Mutex<HashMap<u32, PendingProcedure>>,
    subscriptions: Mutex<HashMap<u32, PendingSubscription>>,
    one_offs: Mutex<HashMap<Vec<u8>, PendingOneOff>>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_reducer(&self, request_id: u32, pending: PendingReducer) {
        self.reducers.lock().insert(request_id, pending);
    }

    pub(crate) fn take_reducer(&self, request_id: u32) -> Option<PendingReducer> {
        let taken = self.reducers.lock().remove(&request_id);
        if let Some(pending) = &taken {
            debug!(
                request_id,
                reducer = %pending.name,
                elapsed_ms = pending.started_at.elapsed().as_millis() as u64,
                "reducer call completed"
            );
        }
        taken
    }

    pub(crate) fn insert_procedure(&self, request_id: u32, pending: PendingProcedure) {
        self.procedures.lock().insert(request_id, pending);
    }

    pub(crate) fn take_procedure(&self, request_id: u32) -> Option<PendingProcedure> {
        self.procedures.lock().remove(&request_id)
    }

    pub(crate) fn insert_subscription(&self, request_id: u32, pending: PendingSubscription) {
        self.subscriptions.lock().insert(request_id, pending);
    }

    pub(crate) fn take_subscription(&self, request_id: u32) -> Option<PendingSubscription> {
        self.subscriptions.lock().remove(&request_id)
    }

    /// Take a pending subscription only when the response type pairs with
    /// the request type (batch completes on `InitialSubscription`, single
    /// on `SubscribeApplied`, multi on `SubscribeMultiApplied`). A
    /// mismatched response leaves the slot in place.
    pub(crate) fn take_subscription_of_kind(
        &self,
        request_id: u32,
        kind: crate::subscription::SubscriptionKind,
    ) -> Option<PendingSubscription> {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.get(&request_id)?.handle.kind() != kind {
            debug!(request_id, "response type does not pair with pending subscription; leaving slot");
            return None;
        }
        subscriptions.remove(&request_id)
    }

    pub(crate) fn insert_one_off(&self, message_id: Vec<u8>, pending: PendingOneOff) {
        self.one_offs.lock().insert(message_id, pending);
    }

    pub(crate) fn take_one_off(&self, message_id: &[u8]) -> Option<PendingOneOff> {
        self.one_offs.lock().remove(message_id)
    }

    /// Complete every pending call with an error built per waiter.
    ///
    /// Used by disconnect (`Cancelled`) and by the reconnect path
    /// (`ConnectionClosed`). Waiters whose receiver is already gone are
    /// dropped silently.
    pub(crate) fn cancel_all(&self, make_error: impl Fn() -> ClientError) {
        let reducers: Vec<PendingReducer> = self.reducers.lock().drain().map(|(_, p)| p).collect();
        for pending in reducers {
            let _ = pending.tx.send(Err(make_error()));
        }
        let procedures: Vec<PendingProcedure> = self.procedures.lock().drain().map(|(_, p)| p).collect();
        for pending in procedures {
            let _ = pending.tx.send(Err(make_error()));
        }
        let subscriptions: Vec<PendingSubscription> = self.subscriptions.lock().drain().map(|(_, p)| p).collect();
        for pending in subscriptions {
            let _ = pending.tx.send(Err(make_error()));
        }
        let one_offs: Vec<PendingOneOff> = self.one_offs.lock().drain().map(|(_, p)| p).collect();
        for pending in one_offs {
            debug!(elapsed_ms = pending.started_at.elapsed().as_millis() as u64, "one-off query cancelled");
            let _ = pending.tx.send(Err(make_error()));
        }
    }

    #[cfg(test)]
    pub(crate) fn reducer_count(&self) -> usize {
        self.reducers.lock().len()
    }
}
