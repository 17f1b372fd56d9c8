//! Session-level counters.
//!
//! Cheap atomic counters maintained by the session task, readable from any
//! thread without blocking it. These cover the transport and correlation
//! layer; row-level counters live with the cache ([`crate::CacheStats`]).

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Counters for one session, monotonic until `reset`.
#[derive(Debug, Default)]
pub(crate) struct SessionMetrics {
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    reducer_calls: AtomicU64,
    reducer_timeouts: AtomicU64,
    reconnect_attempts: AtomicU64,
    successful_connects: AtomicU64,
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Inbound frames processed (after decompression succeeded or failed).
    pub frames_received: u64,
    /// Inbound payload bytes before decompression.
    pub bytes_received: u64,
    /// Outbound client messages accepted for sending.
    pub messages_sent: u64,
    /// Outbound payload bytes.
    pub bytes_sent: u64,
    /// Reducer and procedure calls issued.
    pub reducer_calls: u64,
    /// Calls that hit their deadline.
    pub reducer_timeouts: u64,
    /// Reconnect attempts started.
    pub reconnect_attempts: u64,
    /// Handshakes that reached `Connected` (initial connect included).
    pub successful_connects: u64,
}

impl SessionMetrics {
    pub(crate) fn record_frame(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_send(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_reducer_call(&self) {
        self.reducer_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reducer_timeout(&self) {
        self.reducer_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect(&self) {
        self.successful_connects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            reducer_calls: self.reducer_calls.load(Ordering::Relaxed),
            reducer_timeouts: self.reducer_timeouts.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            successful_connects: self.successful_connects.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_the_snapshot() {
        let metrics = SessionMetrics::default();
        metrics.record_frame(10);
        metrics.record_frame(5);
        metrics.record_send(3);
        metrics.record_reducer_call();
        metrics.record_reducer_timeout();
        metrics.record_reconnect_attempt();
        metrics.record_connect();

        let stats = metrics.snapshot();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.bytes_received, 15);
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.bytes_sent, 3);
        assert_eq!(stats.reducer_calls, 1);
        assert_eq!(stats.reducer_timeouts, 1);
        assert_eq!(stats.reconnect_attempts, 1);
        assert_eq!(stats.successful_connects, 1);
    }

    #[test]
    fn fresh_metrics_snapshot_to_zeroes() {
        assert_eq!(SessionMetrics::default().snapshot(), SessionStats::default());
    }
}
