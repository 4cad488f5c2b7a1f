//! Error types for the stronghold client.

use stronghold_core::{CoreError, SubscriptionId};
use thiserror::Error;

/// Errors that can occur when using the stronghold client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credentials were requested before `initialize`/`establish` ran.
    #[error("client not initialized: credentials have not been established")]
    NotInitialized,

    /// Startup connectivity probe failed. Only ever logged.
    #[error("connectivity check failed: {0}")]
    ConnectivityFailure(String),

    /// One-shot request answered with a non-2xx status.
    #[error("request failed with HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Inbound message or response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A subscriber callback panicked during dispatch.
    #[error("subscriber {0} panicked during dispatch")]
    SubscriberFailure(SubscriptionId),

    /// Failed to establish the realtime channel.
    #[error("connection failed: {0}")]
    Connection(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Token signing error.
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The realtime channel driver is no longer running.
    #[error("realtime channel closed")]
    ChannelClosed,
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        Self::Decode(err.to_string())
    }
}
