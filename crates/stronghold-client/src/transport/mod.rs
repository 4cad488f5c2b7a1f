//! Realtime transports for the chieftain endpoint.
//!
//! A [`Transport`] knows how to open one authenticated connection; the
//! [`EventStream`] it returns yields raw message bodies until the connection
//! ends. Reconnection and decoding live in the channel driver, so transports
//! stay dumb pipes.

use async_trait::async_trait;

use crate::config::{ClientConfig, TransportKind};
use crate::error::ClientError;

mod sse;
mod websocket;

#[cfg(test)]
pub(crate) mod fake;

pub use sse::SseTransport;
pub use websocket::WebSocketTransport;

/// Opens connections to the realtime channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport kind, for logs.
    fn kind(&self) -> TransportKind;

    /// Open a connection authenticated with `credential`.
    async fn connect(&self, credential: &str) -> Result<Box<dyn EventStream>, ClientError>;
}

/// One live connection to the realtime channel.
#[async_trait]
pub trait EventStream: Send {
    /// Next raw message body.
    ///
    /// Returns `None` once the server ended the stream. Must be cancel-safe.
    async fn next_message(&mut self) -> Option<Result<String, ClientError>>;

    /// Tear the connection down.
    async fn close(&mut self);
}

/// Build the transport selected in the config.
pub fn from_config(config: &ClientConfig) -> Result<Box<dyn Transport>, ClientError> {
    match config.transport {
        TransportKind::WebSocket => Ok(Box::new(WebSocketTransport::new(config.base_url())?)),
        TransportKind::ServerSentEvents => Ok(Box::new(SseTransport::new(config.base_url()))),
    }
}
