//! WebSocket transport.
//!
//! Connects to `/ws/chieftain` and authenticates by offering the credential
//! as the `Sec-WebSocket-Protocol` value.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue},
        protocol::Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use super::{EventStream, Transport};
use crate::config::TransportKind;
use crate::error::ClientError;

/// Path of the chieftain socket.
pub const WS_PATH: &str = "/ws/chieftain";

/// WebSocket transport.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Derive the socket URL from the HTTP base URL.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            return Err(ClientError::InvalidConfig(format!(
                "unsupported URL scheme in '{}'",
                base_url
            )));
        };

        Ok(Self {
            url: format!("{}{}", ws_base, WS_PATH),
        })
    }

    /// Socket URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn connect(&self, credential: &str) -> Result<Box<dyn EventStream>, ClientError> {
        debug!(url = %self.url, "Connecting to WebSocket");

        let mut request = self.url.as_str().into_client_request()?;
        let protocol = HeaderValue::from_str(credential).map_err(|e| {
            ClientError::InvalidConfig(format!("credential is not a valid header value: {}", e))
        })?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);

        let (ws, _) = connect_async(request).await?;

        debug!(url = %self.url, "WebSocket connected");
        Ok(Box::new(WebSocketEvents { ws }))
    }
}

struct WebSocketEvents {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl EventStream for WebSocketEvents {
    async fn next_message(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                // Undecodable bytes surface as a JSON error in the driver
                Some(Ok(Message::Binary(data))) => {
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()))
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "WebSocket closed by server");
                    return None;
                }
                // Ping/pong handled by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(e.into())),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}
