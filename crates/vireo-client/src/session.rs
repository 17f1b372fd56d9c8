//! Session state and the frame-ingest task.
//!
//! One logical writer owns all shared mutable state: the spawned session
//! task processes inbound frames in arrival order, finishes every cache
//! mutation and observer callback for a frame before taking the next, and
//! is the only path that completes pending calls. Public methods hand work
//! to it through the outbound channel and oneshot completion slots.
//!
//! Lifecycle: `Disconnected -> Connecting -> Connected` on receipt of the
//! identity token (never on mere socket-open), then `Reconnecting(k)`
//! rounds with exponential backoff on unexpected loop termination, ending
//! back in `Connected` or terminally in `Disconnected`.

use crate::backoff::delay_for_attempt;
use crate::cache::ClientCache;
use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::metrics::SessionMetrics;
use crate::pending::PendingCalls;
use crate::pending::ProcedureOutcome;
use crate::pending::ReducerOutcome;
use crate::pending::RequestIdGenerator;
use crate::socket::WsStream;
use crate::socket::open_socket;
use crate::subscription::SubscriptionKind;
use crate::subscription::SubscriptionRegistry;
use futures::SinkExt;
use futures::StreamExt;
use futures::stream::SplitSink;
use futures::stream::SplitStream;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use vireo_atn::AtnDecode;
use vireo_atn::AtnEncode;
use vireo_atn::ConnectionId;
use vireo_atn::Identity;
use vireo_proto::ClientMessage;
use vireo_proto::ServerMessage;
use vireo_proto::UpdateStatus;
use vireo_proto::decompress_frame;

/// Observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; requests fail with `NotConnected`.
    Disconnected,
    /// Initial socket open and identity handshake in flight.
    Connecting,
    /// Identity received; requests are accepted.
    Connected,
    /// Unexpected drop; backoff and replay in progress.
    Reconnecting {
        /// 1-based attempt counter.
        attempt: u32,
    },
}

/// Lifecycle callbacks registered on the builder.
#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) on_connect: Option<Arc<dyn Fn(Identity, &str) + Send + Sync>>,
    pub(crate) on_identity: Option<Arc<dyn Fn(Identity, ConnectionId) + Send + Sync>>,
    pub(crate) on_disconnect: Option<Arc<dyn Fn(Option<&ClientError>) + Send + Sync>>,
}

/// State shared between the public handle and the session task.
pub(crate) struct SessionShared {
    pub(crate) config: ConnectionConfig,
    pub(crate) url: String,
    pub(crate) cache: Arc<ClientCache>,
    pub(crate) pending: PendingCalls,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) request_ids: RequestIdGenerator,
    pub(crate) query_ids: RequestIdGenerator,
    pub(crate) state: Mutex<ConnectionState>,
    pub(crate) identity: Mutex<Option<Identity>>,
    pub(crate) connection_id: Mutex<Option<ConnectionId>>,
    pub(crate) token: Mutex<Option<String>>,
    pub(crate) sender: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    pub(crate) shutdown: Mutex<CancellationToken>,
    pub(crate) metrics: SessionMetrics,
    pub(crate) callbacks: Callbacks,
}

impl SessionShared {
    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Encode and send a client message; `Connected` only.
    pub(crate) fn send_message(&self, message: &ClientMessage) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        self.send_unchecked(message)
    }

    /// Encode and send without the state gate (handshake-internal sends).
    pub(crate) fn send_unchecked(&self, message: &ClientMessage) -> Result<(), ClientError> {
        let bytes = message.to_atn_vec().map_err(|error| ClientError::ConnectionFailed {
            reason: format!("outbound encode: {error}"),
        })?;
        let byte_count = bytes.len();
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) if tx.send(Message::Binary(bytes)).is_ok() => {
                self.metrics.record_send(byte_count);
                Ok(())
            }
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Invoke the identity callback, then the connect callback.
    pub(crate) fn fire_connected_callbacks(&self) {
        let identity = self.identity.lock().unwrap_or(Identity::ZERO);
        let connection_id = self.connection_id.lock().unwrap_or(ConnectionId::ZERO);
        let token = self.token.lock().clone().unwrap_or_default();
        if let Some(callback) = &self.callbacks.on_identity {
            callback(identity, connection_id);
        }
        if let Some(callback) = &self.callbacks.on_connect {
            callback(identity, &token);
        }
    }
}

/// Finalize a terminal disconnect: registries and cache are cleared, the
/// state lands on `Disconnected`, and the disconnect callback fires once.
pub(crate) fn finalize_disconnect(shared: &SessionShared, error: Option<ClientError>) {
    shared.set_state(ConnectionState::Disconnected);
    *shared.sender.lock() = None;
    shared.pending.cancel_all(|| match error {
        Some(_) => ClientError::ConnectionClosed { reason: None },
        None => ClientError::Cancelled,
    });
    shared.subscriptions.clear();
    shared.cache.clear();
    *shared.identity.lock() = None;
    *shared.connection_id.lock() = None;
    if let Some(callback) = &shared.callbacks.on_disconnect {
        callback(error.as_ref());
    }
    match error {
        Some(error) => warn!(error = %error, "session ended"),
        None => info!("session closed"),
    }
}

// ============================================================================
// Establishment
// ============================================================================

/// Open the socket, run the identity handshake, and start the writer.
///
/// Returns the read half and the per-socket cancellation token. Does not
/// change the session state; callers transition to `Connected` after any
/// replay they need to send first.
pub(crate) async fn establish(
    shared: &Arc<SessionShared>,
) -> Result<(SplitStream<WsStream>, CancellationToken), ClientError> {
    let token = shared.token.lock().clone();
    let mut ws = open_socket(
        &shared.url,
        token.as_deref(),
        shared.config.max_frame_size,
        shared.config.connection_timeout,
    )
    .await?;

    let identity_token = tokio::time::timeout(shared.config.connection_timeout, await_identity(&mut ws))
        .await
        .map_err(|_| ClientError::ConnectionFailed {
            reason: "timed out waiting for identity token".to_string(),
        })??;

    *shared.identity.lock() = Some(identity_token.identity);
    *shared.connection_id.lock() = Some(identity_token.connection_id);
    // The server-issued token supersedes whatever the caller supplied.
    *shared.token.lock() = Some(identity_token.token);
    info!(
        identity = %identity_token.identity,
        connection_id = %identity_token.connection_id,
        "session authenticated"
    );

    let (sink, stream) = ws.split();
    let epoch = shared.shutdown.lock().child_token();
    let (tx, rx) = mpsc::unbounded_channel();
    *shared.sender.lock() = Some(tx);
    tokio::spawn(writer_task(sink, rx, shared.config.ping_interval, epoch.clone()));

    Ok((stream, epoch))
}

/// Read frames until the identity token arrives.
///
/// Anything else as the first data frame is a protocol violation.
async fn await_identity(ws: &mut WsStream) -> Result<vireo_proto::IdentityToken, ClientError> {
    loop {
        let frame = ws.next().await.ok_or_else(|| ClientError::ConnectionFailed {
            reason: "socket closed during handshake".to_string(),
        })?;
        let frame = frame.map_err(|error| ClientError::ConnectionFailed {
            reason: format!("handshake read: {error}"),
        })?;
        let bytes = match frame {
            Message::Binary(bytes) => bytes,
            Message::Text(text) => text.into_bytes(),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                return Err(ClientError::ConnectionFailed {
                    reason: "server closed the socket during handshake".to_string(),
                });
            }
            Message::Frame(_) => continue,
        };
        let payload = decompress_frame(&bytes).map_err(|error| ClientError::ConnectionFailed {
            reason: format!("handshake frame: {error}"),
        })?;
        let message = ServerMessage::from_atn_slice(&payload).map_err(|error| ClientError::ConnectionFailed {
            reason: format!("handshake message: {error}"),
        })?;
        return match message {
            ServerMessage::IdentityToken(token) => Ok(token),
            other => Err(ClientError::ConnectionFailed {
                reason: format!("expected identity token, got {}", message_name(&other)),
            }),
        };
    }
}

fn message_name(message: &ServerMessage) -> &'static str {
    match message {
        ServerMessage::InitialSubscription(_) => "InitialSubscription",
        ServerMessage::TransactionUpdate(_) => "TransactionUpdate",
        ServerMessage::TransactionUpdateLight(_) => "TransactionUpdateLight",
        ServerMessage::IdentityToken(_) => "IdentityToken",
        ServerMessage::OneOffQueryResponse(_) => "OneOffQueryResponse",
        ServerMessage::SubscribeApplied(_) => "SubscribeApplied",
        ServerMessage::UnsubscribeApplied(_) => "UnsubscribeApplied",
        ServerMessage::SubscriptionError(_) => "SubscriptionError",
        ServerMessage::SubscribeMultiApplied(_) => "SubscribeMultiApplied",
        ServerMessage::UnsubscribeMultiApplied(_) => "UnsubscribeMultiApplied",
        ServerMessage::ProcedureResult(_) => "ProcedureResult",
    }
}

// ============================================================================
// Writer task
// ============================================================================

/// Owns the socket write half: outbound frames, keep-alive pings, and the
/// closing frame. A failed write or ping cancels the socket epoch, which
/// the receive side treats as a session error.
async fn writer_task(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    ping_interval: Option<Duration>,
    epoch: CancellationToken,
) {
    let mut ping = ping_interval.map(|period| tokio::time::interval_at(Instant::now() + period, period));
    loop {
        tokio::select! {
            _ = epoch.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                let _ = sink.flush().await;
                return;
            }
            message = outbound.recv() => match message {
                Some(message) => {
                    if let Err(error) = sink.send(message).await {
                        warn!(error = %error, "socket write failed");
                        epoch.cancel();
                        return;
                    }
                }
                None => return,
            },
            _ = tick(ping.as_mut()) => {
                if let Err(error) = sink.send(Message::Ping(Vec::new())).await {
                    warn!(error = %error, "keep-alive ping failed");
                    epoch.cancel();
                    return;
                }
            }
        }
    }
}

async fn tick(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ============================================================================
// Receive loop
// ============================================================================

enum LoopEnd {
    /// User-initiated shutdown; the disconnect path finalizes.
    Shutdown,
    /// Socket or protocol failure; the reconnect path decides what's next.
    Failed(ClientError),
}

async fn receive_loop(
    shared: &Arc<SessionShared>,
    stream: &mut SplitStream<WsStream>,
    epoch: &CancellationToken,
    shutdown: &CancellationToken,
) -> LoopEnd {
    loop {
        tokio::select! {
            _ = epoch.cancelled() => {
                return if shutdown.is_cancelled() {
                    LoopEnd::Shutdown
                } else {
                    LoopEnd::Failed(ClientError::ConnectionClosed {
                        reason: Some("socket writer failed".to_string()),
                    })
                };
            }
            frame = stream.next() => match frame {
                None => return LoopEnd::Failed(ClientError::ConnectionClosed { reason: None }),
                Some(Err(error)) => {
                    return LoopEnd::Failed(ClientError::ConnectionClosed {
                        reason: Some(error.to_string()),
                    });
                }
                Some(Ok(Message::Binary(bytes))) => {
                    if let Err(error) = handle_frame(shared, &bytes) {
                        return LoopEnd::Failed(error);
                    }
                }
                Some(Ok(Message::Text(text))) => {
                    // Text frames are UTF-8 bytes of a binary payload.
                    if let Err(error) = handle_frame(shared, text.as_bytes()) {
                        return LoopEnd::Failed(error);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return LoopEnd::Failed(ClientError::ConnectionClosed {
                        reason: frame.map(|f| f.reason.to_string()),
                    });
                }
                Some(Ok(_)) => continue,
            }
        }
    }
}

/// Decompress, decode, and dispatch one inbound frame.
///
/// Frame-level failures are non-recoverable for the session; dispatch
/// itself never fails (cache decode problems are logged and skipped).
fn handle_frame(shared: &Arc<SessionShared>, bytes: &[u8]) -> Result<(), ClientError> {
    shared.metrics.record_frame(bytes.len());
    let payload = decompress_frame(bytes).map_err(|error| ClientError::ConnectionFailed {
        reason: format!("inbound frame: {error}"),
    })?;
    let message = ServerMessage::from_atn_slice(&payload).map_err(|error| ClientError::ConnectionFailed {
        reason: format!("inbound message: {error}"),
    })?;
    dispatch_message(shared, message);
    Ok(())
}

fn dispatch_message(shared: &Arc<SessionShared>, message: ServerMessage) {
    match message {
        ServerMessage::IdentityToken(token) => {
            // The handshake consumed the real one; a second is a server bug.
            warn!(identity = %token.identity, "ignoring identity token after handshake");
        }

        ServerMessage::InitialSubscription(m) => {
            shared.cache.apply_database_update(&m.database_update);
            if let Some(pending) = shared.pending.take_subscription_of_kind(m.request_id, SubscriptionKind::Batch) {
                shared.subscriptions.insert(pending.handle.clone());
                let _ = pending.tx.send(Ok(()));
            } else {
                debug!(request_id = m.request_id, "initial subscription without pending request (replay)");
            }
        }

        ServerMessage::TransactionUpdate(m) => {
            if let UpdateStatus::Committed(update) = &m.status {
                shared.cache.apply_database_update(update);
            }
            // A slot removed by deadline expiry leaves the update cache-only.
            if let Some(pending) = shared.pending.take_reducer(m.reducer_call.request_id) {
                let result = match m.status {
                    UpdateStatus::Committed(_) => Ok(ReducerOutcome {
                        timestamp: m.timestamp,
                        energy_quanta_used: m.energy_quanta_used,
                        total_host_execution_duration: m.total_host_execution_duration,
                    }),
                    UpdateStatus::Failed(message) => Err(ClientError::ReducerCallFailed {
                        name: pending.name.clone(),
                        message,
                    }),
                    UpdateStatus::OutOfEnergy => Err(ClientError::ReducerOutOfEnergy {
                        name: pending.name.clone(),
                    }),
                };
                let _ = pending.tx.send(result);
            }
        }

        ServerMessage::TransactionUpdateLight(m) => {
            shared.cache.apply_database_update(&m.update);
            if let Some(pending) = shared.pending.take_reducer(m.request_id) {
                // Light updates carry no commit metadata.
                let _ = pending.tx.send(Ok(ReducerOutcome {
                    timestamp: vireo_atn::Timestamp::UNIX_EPOCH,
                    energy_quanta_used: vireo_proto::EnergyQuanta::default(),
                    total_host_execution_duration: vireo_atn::TimeDuration::ZERO,
                }));
            }
        }

        ServerMessage::OneOffQueryResponse(m) => {
            if let Some(pending) = shared.pending.take_one_off(&m.message_id) {
                let _ = pending.tx.send(Ok(m));
            } else {
                warn!("one-off query response without a pending call");
            }
        }

        ServerMessage::SubscribeApplied(m) => {
            shared.cache.apply_table_update(&m.rows.table_rows);
            if let Some(pending) = shared.pending.take_subscription_of_kind(m.request_id, SubscriptionKind::Single) {
                shared.subscriptions.insert(pending.handle.clone());
                let _ = pending.tx.send(Ok(()));
            }
        }

        ServerMessage::UnsubscribeApplied(m) => {
            shared.cache.apply_table_update(&m.rows.table_rows);
            debug!(request_id = m.request_id, query_id = %m.query_id, "unsubscribe applied");
        }

        ServerMessage::SubscribeMultiApplied(m) => {
            shared.cache.apply_database_update(&m.update);
            if let Some(pending) = shared.pending.take_subscription_of_kind(m.request_id, SubscriptionKind::Multi) {
                shared.subscriptions.insert(pending.handle.clone());
                let _ = pending.tx.send(Ok(()));
            }
        }

        ServerMessage::UnsubscribeMultiApplied(m) => {
            shared.cache.apply_database_update(&m.update);
            debug!(request_id = m.request_id, query_id = %m.query_id, "unsubscribe multi applied");
        }

        ServerMessage::SubscriptionError(m) => match m.request_id {
            Some(request_id) => {
                shared.subscriptions.remove(request_id);
                if let Some(pending) = shared.pending.take_subscription(request_id) {
                    let _ = pending.tx.send(Err(ClientError::SubscriptionFailed { message: m.error }));
                } else {
                    warn!(request_id, error = %m.error, "subscription error for unknown request");
                }
            }
            None => {
                // Server-initiated teardown: every active handle is invalid.
                // Pending subscribe calls stay pending; cache observers do
                // not fire.
                let dropped = shared.subscriptions.clear();
                warn!(dropped, error = %m.error, "server dropped all subscriptions");
            }
        },

        ServerMessage::ProcedureResult(m) => {
            if let Some(pending) = shared.pending.take_procedure(m.request_id) {
                let result = match m.status {
                    vireo_proto::ProcedureStatus::Returned(value) => Ok(ProcedureOutcome {
                        value,
                        timestamp: m.timestamp,
                        total_host_execution_duration: m.total_host_execution_duration,
                    }),
                    vireo_proto::ProcedureStatus::InternalError(message) => Err(ClientError::ReducerCallFailed {
                        name: pending.name.clone(),
                        message,
                    }),
                    vireo_proto::ProcedureStatus::OutOfEnergy => Err(ClientError::ReducerOutOfEnergy {
                        name: pending.name.clone(),
                    }),
                };
                let _ = pending.tx.send(result);
            }
        }
    }
}

// ============================================================================
// Session task: receive until drop, then reconnect or finalize
// ============================================================================

enum ReconnectEnd {
    Connected {
        stream: SplitStream<WsStream>,
        epoch: CancellationToken,
    },
    Shutdown,
    Exhausted,
}

/// Drive one session: pump frames, and on unexpected drop run the backoff
/// and replay schedule until reconnected or exhausted.
pub(crate) async fn run_session(
    shared: Arc<SessionShared>,
    mut stream: SplitStream<WsStream>,
    mut epoch: CancellationToken,
    shutdown: CancellationToken,
) {
    loop {
        let end = receive_loop(&shared, &mut stream, &epoch, &shutdown).await;
        epoch.cancel();
        match end {
            LoopEnd::Shutdown => return,
            LoopEnd::Failed(error) => {
                warn!(error = %error, "receive loop terminated");
                if shared.config.max_reconnect_attempts == 0 {
                    finalize_disconnect(&shared, Some(error));
                    return;
                }
                shared.pending.cancel_all(|| ClientError::ConnectionClosed { reason: None });
                match reconnect(&shared, &shutdown).await {
                    ReconnectEnd::Connected {
                        stream: next_stream,
                        epoch: next_epoch,
                    } => {
                        stream = next_stream;
                        epoch = next_epoch;
                    }
                    ReconnectEnd::Shutdown => return,
                    ReconnectEnd::Exhausted => {
                        finalize_disconnect(
                            &shared,
                            Some(ClientError::ReconnectFailed {
                                attempts: shared.config.max_reconnect_attempts,
                            }),
                        );
                        return;
                    }
                }
            }
        }
    }
}

/// Backoff-and-retry until a handshake succeeds or attempts run out.
///
/// On success the active subscriptions are replayed as one batch subscribe
/// before the session returns to `Connected`, so no reducer call can slip
/// in ahead of the replay.
async fn reconnect(shared: &Arc<SessionShared>, shutdown: &CancellationToken) -> ReconnectEnd {
    let max_attempts = shared.config.max_reconnect_attempts;
    for attempt in 1..=max_attempts {
        shared.set_state(ConnectionState::Reconnecting { attempt });
        shared.metrics.record_reconnect_attempt();
        let delay = delay_for_attempt(shared.config.reconnect_delay, shared.config.max_reconnect_delay, attempt - 1);
        info!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::select! {
            _ = shutdown.cancelled() => return ReconnectEnd::Shutdown,
            _ = tokio::time::sleep(delay) => {}
        }

        match establish(shared).await {
            Ok((stream, epoch)) => {
                let queries = shared.subscriptions.replay_queries();
                if !queries.is_empty() {
                    let request_id = shared.request_ids.next_id();
                    info!(queries = queries.len(), request_id, "replaying subscriptions");
                    if let Err(error) = shared.send_unchecked(&ClientMessage::Subscribe { queries, request_id }) {
                        warn!(error = %error, "subscription replay failed");
                        epoch.cancel();
                        continue;
                    }
                }
                shared.set_state(ConnectionState::Connected);
                shared.metrics.record_connect();
                shared.fire_connected_callbacks();
                return ReconnectEnd::Connected { stream, epoch };
            }
            Err(error) => {
                warn!(attempt, error = %error, "reconnect attempt failed");
            }
        }
    }
    ReconnectEnd::Exhausted
}
