//! Public connection handle and builder.
//!
//! A [`DbConnection`] is a cheap clonable handle onto one session. The
//! builder collects the target, credentials, tuning knobs, and lifecycle
//! callbacks; `build()` optionally establishes the session immediately
//! (`auto_connect`, the default).
//!
//! # Example
//!
//! ```rust,ignore
//! use vireo_client::DbConnection;
//!
//! let conn = DbConnection::builder()
//!     .with_uri("ws://localhost:3000")
//!     .with_module_name("chat")
//!     .on_connect(|identity, _token| println!("connected as {identity}"))
//!     .build()
//!     .await?;
//!
//! let sub = conn.subscribe(vec!["SELECT * FROM message".to_string()]).await?;
//! conn.call_reducer("send_message", args, Default::default()).await?;
//! ```

use crate::cache::ClientCache;
use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::error::Result;
use crate::metrics::SessionMetrics;
use crate::metrics::SessionStats;
use crate::pending::PendingCalls;
use crate::pending::PendingOneOff;
use crate::pending::PendingProcedure;
use crate::pending::PendingReducer;
use crate::pending::PendingSubscription;
use crate::pending::ProcedureOutcome;
use crate::pending::ReducerOutcome;
use crate::pending::RequestIdGenerator;
use crate::pk::PrimaryKeyExtractor;
use crate::session::Callbacks;
use crate::session::ConnectionState;
use crate::session::SessionShared;
use crate::session::establish;
use crate::session::finalize_disconnect;
use crate::session::run_session;
use crate::socket::check_scheme;
use crate::socket::session_url;
use crate::subscription::SubscriptionHandle;
use crate::subscription::SubscriptionKind;
use crate::subscription::SubscriptionRegistry;
use crate::table::TableHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vireo_atn::ConnectionId;
use vireo_atn::Identity;
use vireo_proto::CallReducerFlags;
use vireo_proto::ClientMessage;
use vireo_proto::OneOffQueryResponse;
use vireo_proto::QueryId;

/// Handle onto one session with a Vireo database module.
#[derive(Clone)]
pub struct DbConnection {
    shared: Arc<SessionShared>,
}

impl DbConnection {
    /// Start configuring a connection.
    pub fn builder() -> DbConnectionBuilder {
        DbConnectionBuilder::new()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// The authenticated identity, once the handshake has completed.
    pub fn identity(&self) -> Option<Identity> {
        *self.shared.identity.lock()
    }

    /// The server-assigned connection id, once the handshake has completed.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        *self.shared.connection_id.lock()
    }

    /// The current bearer token (server-issued once connected).
    pub fn token(&self) -> Option<String> {
        self.shared.token.lock().clone()
    }

    /// The session's row cache.
    pub fn cache(&self) -> &Arc<ClientCache> {
        &self.shared.cache
    }

    /// Number of currently active subscriptions.
    pub fn active_subscription_count(&self) -> usize {
        self.shared.subscriptions.len()
    }

    /// Transport and correlation counters for this session.
    pub fn session_stats(&self) -> SessionStats {
        self.shared.metrics.snapshot()
    }

    /// A per-table view over this session's cache.
    ///
    /// Creates the table lazily; generated bindings wrap this in typed
    /// accessors.
    pub fn table(&self, table_name: impl Into<String>) -> TableHandle {
        TableHandle::new(Arc::clone(&self.shared.cache), table_name.into())
    }

    /// Establish the session: open the socket, complete the identity
    /// handshake, and start the frame-ingest task.
    ///
    /// A no-op when the session is already connecting or connected.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
                _ => return Ok(()),
            }
        }
        let shutdown = CancellationToken::new();
        *self.shared.shutdown.lock() = shutdown.clone();
        match establish(&self.shared).await {
            Ok((stream, epoch)) => {
                if shutdown.is_cancelled() {
                    // disconnect() raced the handshake; it already finalized.
                    epoch.cancel();
                    return Err(ClientError::Cancelled);
                }
                self.shared.set_state(ConnectionState::Connected);
                self.shared.metrics.record_connect();
                self.shared.fire_connected_callbacks();
                tokio::spawn(run_session(Arc::clone(&self.shared), stream, epoch, shutdown));
                Ok(())
            }
            Err(error) => {
                self.shared.set_state(ConnectionState::Disconnected);
                Err(error)
            }
        }
    }

    /// Tear the session down: close the socket with a normal closure,
    /// cancel pending calls with [`ClientError::Cancelled`], clear the
    /// registries and the cache, and fire the disconnect callback with no
    /// error. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        if self.shared.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        self.shared.shutdown.lock().cancel();
        finalize_disconnect(&self.shared, None);
        Ok(())
    }

    /// Invoke a reducer and await its transaction result.
    ///
    /// Fails with [`ClientError::ReducerTimeout`] when no result arrives
    /// within the configured deadline; a result arriving after the
    /// deadline is applied to the cache only.
    pub async fn call_reducer(&self, name: &str, args: Vec<u8>, flags: CallReducerFlags) -> Result<ReducerOutcome> {
        let request_id = self.shared.request_ids.next_id();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert_reducer(
            request_id,
            PendingReducer {
                name: name.to_string(),
                started_at: Instant::now(),
                tx,
            },
        );
        let message = ClientMessage::CallReducer {
            name: name.to_string(),
            args,
            request_id,
            flags,
        };
        if let Err(error) = self.shared.send_message(&message) {
            self.shared.pending.take_reducer(request_id);
            return Err(error);
        }
        self.shared.metrics.record_reducer_call();
        debug!(reducer = %name, request_id, "reducer call sent");

        let deadline = self.shared.config.reducer_call_timeout;
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::Cancelled),
            Err(_) => {
                self.shared.pending.take_reducer(request_id);
                self.shared.metrics.record_reducer_timeout();
                Err(ClientError::ReducerTimeout {
                    name: name.to_string(),
                    seconds: deadline.as_secs(),
                })
            }
        }
    }

    /// Invoke a procedure and await its returned value.
    pub async fn call_procedure(&self, name: &str, args: Vec<u8>, flags: CallReducerFlags) -> Result<ProcedureOutcome> {
        let request_id = self.shared.request_ids.next_id();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert_procedure(
            request_id,
            PendingProcedure {
                name: name.to_string(),
                started_at: Instant::now(),
                tx,
            },
        );
        let message = ClientMessage::CallProcedure {
            name: name.to_string(),
            args,
            request_id,
            flags,
        };
        if let Err(error) = self.shared.send_message(&message) {
            self.shared.pending.take_procedure(request_id);
            return Err(error);
        }
        self.shared.metrics.record_reducer_call();

        let deadline = self.shared.config.reducer_call_timeout;
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::Cancelled),
            Err(_) => {
                self.shared.pending.take_procedure(request_id);
                self.shared.metrics.record_reducer_timeout();
                Err(ClientError::ReducerTimeout {
                    name: name.to_string(),
                    seconds: deadline.as_secs(),
                })
            }
        }
    }

    /// Replace the session's batch subscription set.
    ///
    /// Resolves when the server has applied the set and the initial
    /// snapshot has landed in the cache. Batch subscriptions do not time
    /// out; they fail only on server rejection or session teardown.
    pub async fn subscribe(&self, queries: Vec<String>) -> Result<SubscriptionHandle> {
        let request_id = self.shared.request_ids.next_id();
        let handle = SubscriptionHandle::new(request_id, SubscriptionKind::Batch, None, queries.clone());
        self.register_and_send(
            request_id,
            handle.clone(),
            ClientMessage::Subscribe { queries, request_id },
        )
        .await?;
        Ok(handle)
    }

    /// Add a single query to the subscription set.
    pub async fn subscribe_single(&self, query: impl Into<String>) -> Result<SubscriptionHandle> {
        let query = query.into();
        let request_id = self.shared.request_ids.next_id();
        let query_id = QueryId(self.shared.query_ids.next_id());
        let handle = SubscriptionHandle::new(request_id, SubscriptionKind::Single, Some(query_id), vec![query.clone()]);
        self.register_and_send(
            request_id,
            handle.clone(),
            ClientMessage::SubscribeSingle {
                query,
                request_id,
                query_id,
            },
        )
        .await?;
        Ok(handle)
    }

    /// Add a query group to the subscription set.
    pub async fn subscribe_multi(&self, queries: Vec<String>) -> Result<SubscriptionHandle> {
        let request_id = self.shared.request_ids.next_id();
        let query_id = QueryId(self.shared.query_ids.next_id());
        let handle = SubscriptionHandle::new(request_id, SubscriptionKind::Multi, Some(query_id), queries.clone());
        self.register_and_send(
            request_id,
            handle.clone(),
            ClientMessage::SubscribeMulti {
                queries,
                request_id,
                query_id,
            },
        )
        .await?;
        Ok(handle)
    }

    async fn register_and_send(
        &self,
        request_id: u32,
        handle: SubscriptionHandle,
        message: ClientMessage,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert_subscription(
            request_id,
            PendingSubscription {
                handle,
                started_at: Instant::now(),
                tx,
            },
        );
        if let Err(error) = self.shared.send_message(&message) {
            self.shared.pending.take_subscription(request_id);
            return Err(error);
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Cancelled),
        }
    }

    /// Remove a subscription.
    ///
    /// The handle leaves the active registry unconditionally; when it
    /// names a query set, the matching unsubscribe message is also sent.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        self.shared.subscriptions.remove(handle.request_id());
        let Some(query_id) = handle.query_id() else {
            return Ok(());
        };
        let request_id = self.shared.request_ids.next_id();
        let message = match handle.kind() {
            SubscriptionKind::Multi => ClientMessage::UnsubscribeMulti { request_id, query_id },
            _ => ClientMessage::Unsubscribe { request_id, query_id },
        };
        self.shared.send_message(&message)
    }

    /// Run a standalone query outside any subscription.
    ///
    /// The response carries either result tables or the server's error
    /// message; transport-level failures surface as [`ClientError`].
    pub async fn one_off_query(&self, query: impl Into<String>) -> Result<OneOffQueryResponse> {
        let message_id = self.shared.request_ids.next_id().to_le_bytes().to_vec();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert_one_off(
            message_id.clone(),
            PendingOneOff {
                started_at: Instant::now(),
                tx,
            },
        );
        let message = ClientMessage::OneOffQuery {
            message_id: message_id.clone(),
            query: query.into(),
        };
        if let Err(error) = self.shared.send_message(&message) {
            self.shared.pending.take_one_off(&message_id);
            return Err(error);
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Cancelled),
        }
    }
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("url", &self.shared.url)
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`DbConnection`].
#[derive(Default)]
pub struct DbConnectionBuilder {
    uri: Option<String>,
    module_name: Option<String>,
    token: Option<String>,
    config: ConnectionConfig,
    extractors: HashMap<String, PrimaryKeyExtractor>,
    callbacks: Callbacks,
}

impl DbConnectionBuilder {
    /// Start with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Server URI, `ws://host[:port]` or `wss://host[:port]`.
    ///
    /// A URI already containing `/database/subscribe/` is used verbatim
    /// and the module name becomes optional.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Module to open the session against.
    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    /// Bearer token for the upgrade request; replaced by the server-issued
    /// token after the first handshake.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Keep-alive ping interval; `None` disables pings.
    pub fn with_ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Deadline for socket open plus identity handshake.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Reconnect attempts after an unexpected drop; 0 disables.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Base delay of the reconnect backoff schedule.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Ceiling of the reconnect backoff schedule.
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.max_reconnect_delay = delay;
        self
    }

    /// Deadline for reducer and procedure calls.
    pub fn with_reducer_call_timeout(mut self, timeout: Duration) -> Self {
        self.config.reducer_call_timeout = timeout;
        self
    }

    /// Whether `build()` connects immediately (default true).
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.config.auto_connect = auto_connect;
        self
    }

    /// Maximum inbound WebSocket frame and message size.
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.config.max_frame_size = bytes;
        self
    }

    /// Pre-register primary-key extractors (generated bindings call this).
    pub fn with_extractors(mut self, extractors: HashMap<String, PrimaryKeyExtractor>) -> Self {
        self.extractors = extractors;
        self
    }

    /// Invoked after each successful handshake, after the identity callback.
    pub fn on_connect(mut self, callback: impl Fn(Identity, &str) + Send + Sync + 'static) -> Self {
        self.callbacks.on_connect = Some(Arc::new(callback));
        self
    }

    /// Invoked when the server issues (or re-issues) the session identity.
    pub fn on_identity(mut self, callback: impl Fn(Identity, ConnectionId) + Send + Sync + 'static) -> Self {
        self.callbacks.on_identity = Some(Arc::new(callback));
        self
    }

    /// Invoked once per terminal disconnect; the error is absent for a
    /// caller-initiated disconnect.
    pub fn on_disconnect(mut self, callback: impl Fn(Option<&ClientError>) + Send + Sync + 'static) -> Self {
        self.callbacks.on_disconnect = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration and construct the connection.
    pub async fn build(self) -> Result<DbConnection> {
        let cache = Arc::new(ClientCache::with_extractors(self.extractors));
        let uri = self.uri.ok_or(ClientError::BuilderMissingConfiguration { field: "uri" })?;
        check_scheme(&uri)?;
        let url = match &self.module_name {
            Some(module_name) => session_url(&uri, module_name),
            None if uri.contains("/database/subscribe/") => uri,
            None => return Err(ClientError::BuilderMissingConfiguration { field: "module_name" }),
        };

        let auto_connect = self.config.auto_connect;
        let shared = Arc::new(SessionShared {
            config: self.config,
            url,
            cache,
            pending: PendingCalls::new(),
            subscriptions: SubscriptionRegistry::new(),
            request_ids: RequestIdGenerator::default(),
            query_ids: RequestIdGenerator::default(),
            state: Mutex::new(ConnectionState::Disconnected),
            identity: Mutex::new(None),
            connection_id: Mutex::new(None),
            token: Mutex::new(self.token),
            sender: Mutex::new(None),
            shutdown: Mutex::new(CancellationToken::new()),
            metrics: SessionMetrics::default(),
            callbacks: self.callbacks,
        });
        let connection = DbConnection { shared };
        if auto_connect {
            connection.connect().await?;
        }
        Ok(connection)
    }
}
