//! Stronghold client facade.

use std::sync::Arc;

use reqwest::Method;
use stronghold_core::{NewTask, Peon, PeonId, SubscriptionId, Task, TaskId, Update};
use tokio::sync::watch;
use tracing::info;

use crate::channel::{ChannelHandle, ConnectionState, Subscription};
use crate::config::ClientConfig;
use crate::credential::CredentialManager;
use crate::error::ClientError;
use crate::gateway::{ProbeOutcome, RequestGateway};
use crate::transport::{self, Transport};

/// Client for a stronghold server.
///
/// Combines the authenticated REST gateway with the realtime channel. Both
/// share one [`CredentialManager`], so nothing works until
/// [`initialize`](Self::initialize) has run.
pub struct StrongholdClient {
    config: ClientConfig,
    credentials: Arc<CredentialManager>,
    gateway: RequestGateway,
    channel: ChannelHandle,
}

impl StrongholdClient {
    /// Create a client using the transport selected in `config`.
    ///
    /// Spawns the channel driver, so it must be called within a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = transport::from_config(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client with an explicit transport.
    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Self {
        let credentials = Arc::new(CredentialManager::for_kind(config.credential));
        let gateway = RequestGateway::new(config.base_url(), credentials.clone());
        let channel = ChannelHandle::spawn(
            transport,
            credentials.clone(),
            config.reconnect_delay,
            config.connect_timeout,
        );

        Self {
            config,
            credentials,
            gateway,
            channel,
        }
    }

    /// Establish credentials, then probe the health endpoint.
    ///
    /// The probe is advisory: an unreachable server is logged and reported in
    /// the outcome, but initialization still succeeds.
    pub async fn initialize(&self) -> Result<ProbeOutcome, ClientError> {
        self.credentials.establish(&self.config.secret).await?;

        let outcome = self
            .gateway
            .probe(&self.config.health_path, self.config.probe_timeout)
            .await;
        info!(
            base_url = %self.config.base_url(),
            reachable = outcome.is_reachable(),
            "Stronghold client initialized"
        );
        Ok(outcome)
    }

    /// Register a callback for every realtime update.
    ///
    /// The first subscription opens the realtime channel.
    pub async fn subscribe<F>(&self, callback: F) -> Result<Subscription, ClientError>
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        self.channel.subscribe(Arc::new(callback)).await
    }

    /// Remove a subscription by id. The last removal closes the channel.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, ClientError> {
        self.channel.unsubscribe(id).await
    }

    /// Drop all subscriptions and close the channel without reconnecting.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.channel.disconnect().await?;
        Ok(())
    }

    /// Number of active subscriptions.
    pub async fn subscriber_count(&self) -> Result<usize, ClientError> {
        self.channel.subscriber_count().await
    }

    /// Current realtime connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Receiver notified on realtime connection state changes.
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.watch_state()
    }

    /// Submit a new task.
    pub async fn create_task(&self, task: NewTask) -> Result<Task, ClientError> {
        let body = serde_json::to_value(&task).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.gateway
            .request_json(Method::POST, "/api/task", Some(body))
            .await
    }

    /// Fetch a task by id.
    pub async fn get_task(&self, id: TaskId) -> Result<Task, ClientError> {
        self.gateway
            .request_json(Method::GET, &format!("/api/task/{}", id), None)
            .await
    }

    /// Fetch a peon by id.
    pub async fn get_peon(&self, id: PeonId) -> Result<Peon, ClientError> {
        self.gateway
            .request_json(Method::GET, &format!("/api/peon/{}", id), None)
            .await
    }

    /// Cancel a pending task.
    pub async fn cancel_task(&self, id: TaskId) -> Result<(), ClientError> {
        self.gateway
            .request_ok(Method::POST, &format!("/api/task/{}/cancel", id), None)
            .await?;
        Ok(())
    }
}
