//! WebSocket transport: URL conventions, upgrade handshake, frame limits.
//!
//! A session URL has the shape `{ws,wss}://host[:port]/database/subscribe/
//! <module>`; a caller-provided URL that already contains the subscribe
//! path is used verbatim. The upgrade advertises the binary subprotocol
//! and, when a token is present, a bearer `Authorization` header.

use crate::error::ClientError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::debug;
use vireo_proto::BIN_PROTOCOL;

/// The connected socket type used by the session.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Path segment marking a complete session URL.
const SUBSCRIBE_PATH: &str = "/database/subscribe/";

/// Build the session URL for a module, honoring verbatim URLs.
pub fn session_url(uri: &str, module_name: &str) -> String {
    if uri.contains(SUBSCRIBE_PATH) {
        uri.to_string()
    } else {
        format!("{}{}{}", uri.trim_end_matches('/'), SUBSCRIBE_PATH, module_name)
    }
}

/// Validate that a URI carries a WebSocket scheme.
pub(crate) fn check_scheme(uri: &str) -> Result<(), ClientError> {
    if uri.starts_with("ws://") || uri.starts_with("wss://") {
        Ok(())
    } else {
        Err(ClientError::ConnectionFailed {
            reason: format!("unsupported scheme in '{uri}': expected ws:// or wss://"),
        })
    }
}

/// Open the WebSocket with the binary subprotocol and optional bearer token.
pub(crate) async fn open_socket(
    url: &str,
    token: Option<&str>,
    max_frame_size: usize,
    connection_timeout: Duration,
) -> Result<WsStream, ClientError> {
    let mut request = url.into_client_request().map_err(|error| ClientError::ConnectionFailed {
        reason: format!("invalid session url '{url}': {error}"),
    })?;
    request
        .headers_mut()
        .insert(header::SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(BIN_PROTOCOL));
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ClientError::ConnectionFailed {
            reason: "token contains bytes not representable in a header".to_string(),
        })?;
        request.headers_mut().insert(header::AUTHORIZATION, value);
    }

    let mut socket_config = WebSocketConfig::default();
    socket_config.max_message_size = Some(max_frame_size);
    socket_config.max_frame_size = Some(max_frame_size);

    let connect = connect_async_with_config(request, Some(socket_config), false);
    let (stream, response) = tokio::time::timeout(connection_timeout, connect)
        .await
        .map_err(|_| ClientError::ConnectionFailed {
            reason: format!("socket open timed out after {connection_timeout:?}"),
        })?
        .map_err(|error| ClientError::ConnectionFailed {
            reason: format!("websocket upgrade failed: {error}"),
        })?;

    debug!(url = %url, status = %response.status(), "websocket established");
    Ok(stream)
}
