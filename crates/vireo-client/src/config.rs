//! Session configuration.
//!
//! Defaults are deliberately conservative; every knob is overridable on the
//! connection builder. All limits are fixed at session construction.

use std::time::Duration;

/// Default interval between keep-alive pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default deadline for opening the socket and completing the handshake.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of reconnect attempts before giving up (0 disables).
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Default base delay of the reconnect backoff schedule.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default ceiling of the reconnect backoff schedule.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Default deadline for reducer calls.
pub const DEFAULT_REDUCER_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum WebSocket frame and message size (16 MiB).
///
/// Bounded to prevent a misbehaving server from exhausting client memory.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Tunable parameters of one session.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Keep-alive ping interval; `None` disables pings.
    pub ping_interval: Option<Duration>,
    /// Deadline for socket open plus identity handshake.
    pub connection_timeout: Duration,
    /// Reconnect attempts after an unexpected drop; 0 disables reconnection.
    pub max_reconnect_attempts: u32,
    /// Base delay of the exponential backoff schedule.
    pub reconnect_delay: Duration,
    /// Ceiling of the backoff schedule.
    pub max_reconnect_delay: Duration,
    /// Deadline for reducer and procedure calls.
    pub reducer_call_timeout: Duration,
    /// Whether `build()` establishes the session immediately.
    pub auto_connect: bool,
    /// Maximum inbound WebSocket frame and message size.
    pub max_frame_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Some(DEFAULT_PING_INTERVAL),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            reducer_call_timeout: DEFAULT_REDUCER_CALL_TIMEOUT,
            auto_connect: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
