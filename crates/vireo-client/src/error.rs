//! User-visible error taxonomy.
//!
//! Everything the public API returns is one of these variants. Wire,
//! compression, and codec failures are folded into the taxonomy with their
//! causes preserved in the diagnostic strings; internal error enums never
//! escape this boundary.

use snafu::Snafu;

/// Result alias for client operations.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Errors surfaced to applications by the connection API.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    /// A request was attempted outside the `Connected` state.
    #[snafu(display("not connected"))]
    NotConnected,

    /// Establishing (or re-establishing) the session failed.
    #[snafu(display("connection failed: {reason}"))]
    ConnectionFailed {
        /// Description of the underlying failure.
        reason: String,
    },

    /// Every reconnect attempt was exhausted.
    #[snafu(display("reconnect failed after {attempts} attempts"))]
    ReconnectFailed {
        /// How many attempts were made.
        attempts: u32,
    },

    /// The reducer ran and rejected the call.
    #[snafu(display("reducer '{name}' failed: {message}"))]
    ReducerCallFailed {
        /// Reducer name.
        name: String,
        /// Failure message reported by the module.
        message: String,
    },

    /// No result arrived within the reducer call deadline.
    #[snafu(display("reducer '{name}' timed out after {seconds} seconds"))]
    ReducerTimeout {
        /// Reducer name.
        name: String,
        /// The deadline that expired, in seconds.
        seconds: u64,
    },

    /// The call was aborted by the host's energy accounting.
    #[snafu(display("reducer '{name}' ran out of energy"))]
    ReducerOutOfEnergy {
        /// Reducer name.
        name: String,
    },

    /// A subscription was rejected by the server.
    #[snafu(display("subscription failed: {message}"))]
    SubscriptionFailed {
        /// Failure message reported by the server.
        message: String,
    },

    /// The builder was asked to build without a required field.
    #[snafu(display("builder is missing required configuration: {field}"))]
    BuilderMissingConfiguration {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The session ended underneath a pending operation.
    #[snafu(display("connection closed{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()))]
    ConnectionClosed {
        /// Close reason, when the transport reported one.
        reason: Option<String>,
    },

    /// The operation was cancelled by an explicit disconnect.
    #[snafu(display("operation cancelled"))]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reducer_timeout_display() {
        let err = ClientError::ReducerTimeout {
            name: "add".to_string(),
            seconds: 30,
        };
        assert_eq!(err.to_string(), "reducer 'add' timed out after 30 seconds");
    }

    #[test]
    fn connection_closed_display_with_and_without_reason() {
        let bare = ClientError::ConnectionClosed { reason: None };
        assert_eq!(bare.to_string(), "connection closed");
        let with_reason = ClientError::ConnectionClosed {
            reason: Some("going away".to_string()),
        };
        assert_eq!(with_reason.to_string(), "connection closed: going away");
    }

    #[test]
    fn builder_missing_configuration_display() {
        let err = ClientError::BuilderMissingConfiguration { field: "uri" };
        assert_eq!(err.to_string(), "builder is missing required configuration: uri");
    }
}
