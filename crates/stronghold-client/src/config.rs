//! Client configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;

/// Which push transport carries the realtime channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    /// Persistent WebSocket at `/ws/chieftain`.
    #[default]
    WebSocket,
    /// Server-sent event stream at `/events?type=chieftain`.
    ServerSentEvents,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => write!(f, "websocket"),
            Self::ServerSentEvents => write!(f, "sse"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "sse" | "events" => Ok(Self::ServerSentEvents),
            other => Err(ClientError::InvalidConfig(format!(
                "unknown transport '{}'",
                other
            ))),
        }
    }
}

/// How credential material is derived from the shared secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialKind {
    /// HS256-signed bearer token, valid for 24 hours.
    #[default]
    SignedToken,
    /// Hex SHA-256 digest of the secret.
    HashedSecret,
}

impl FromStr for CredentialKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "token" | "jwt" => Ok(Self::SignedToken),
            "hash" | "sha256" => Ok(Self::HashedSecret),
            other => Err(ClientError::InvalidConfig(format!(
                "unknown credential strategy '{}'",
                other
            ))),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the stronghold server.
    pub base_url: String,

    /// Shared secret credentials are derived from.
    pub secret: String,

    /// Realtime transport.
    pub transport: TransportKind,

    /// Credential strategy.
    pub credential: CredentialKind,

    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,

    /// Deadline for the startup connectivity probe.
    pub probe_timeout: Duration,

    /// Deadline for each realtime connect attempt.
    pub connect_timeout: Duration,

    /// Path probed during `initialize`.
    pub health_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            secret: String::new(),
            transport: TransportKind::default(),
            credential: CredentialKind::default(),
            reconnect_delay: Duration::from_millis(5000),
            probe_timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(5000),
            health_path: "/api/test".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a config for a server and secret, everything else defaulted.
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Create config from environment.
    ///
    /// Unset variables fall back to defaults; malformed ones are errors.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("STRONGHOLD_URL") {
            config.base_url = url;
        }
        if let Ok(secret) = std::env::var("STRONGHOLD_SECRET") {
            config.secret = secret;
        }
        if let Ok(transport) = std::env::var("STRONGHOLD_TRANSPORT") {
            config.transport = transport.parse()?;
        }
        if let Ok(auth) = std::env::var("STRONGHOLD_AUTH") {
            config.credential = auth.parse()?;
        }
        if let Some(delay) = env_millis("STRONGHOLD_RECONNECT_DELAY_MS")? {
            config.reconnect_delay = delay;
        }
        if let Some(timeout) = env_millis("STRONGHOLD_PROBE_TIMEOUT_MS")? {
            config.probe_timeout = timeout;
        }
        if let Some(timeout) = env_millis("STRONGHOLD_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = timeout;
        }

        Ok(config)
    }

    /// Builder method to select the transport.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Builder method to select the credential strategy.
    pub fn with_credential(mut self, credential: CredentialKind) -> Self {
        self.credential = credential;
        self
    }

    /// Builder method to set the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Builder method to set the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Builder method to set the realtime connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn env_millis(name: &str) -> Result<Option<Duration>, ClientError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ClientError::InvalidConfig(format!("{} must be milliseconds", name))),
        Err(_) => Ok(None),
    }
}
