//! Realtime channel driver.
//!
//! A single background task owns the subscriber registry, the live
//! [`EventStream`] and the reconnect deadline. Facade calls reach it as
//! commands over an mpsc channel, so every state change is serialized
//! through one `select!` loop:
//!
//! - the first subscriber opens the connection, the last one closes it
//! - a transport error or server hang-up schedules one reconnect after a
//!   fixed delay, retried until the registry empties or `disconnect` runs
//! - a connect attempt that outlives the connect timeout counts as a failed
//!   open and is retried the same way
//! - caller-initiated closes clear the reconnect deadline in the same step,
//!   so a pending reconnect can never resurrect the connection

use std::sync::Arc;
use std::time::Duration;

use stronghold_core::{SubscriptionId, Update};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::credential::CredentialManager;
use crate::error::ClientError;
use crate::registry::{SubscriberRegistry, UpdateCallback};
use crate::transport::{EventStream, Transport};

/// State of the realtime connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection.
    #[default]
    Closed,
    /// Connection attempt in flight.
    Connecting,
    /// Connection established.
    Open,
}

enum Command {
    Subscribe {
        callback: UpdateCallback,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        reply: oneshot::Sender<usize>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the channel driver task.
///
/// The driver stops once every handle and [`Subscription`] is dropped.
#[derive(Clone)]
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
    credentials: Arc<CredentialManager>,
    state: watch::Receiver<ConnectionState>,
}

impl ChannelHandle {
    /// Spawn the driver task. Must be called within a tokio runtime.
    pub fn spawn(
        transport: Box<dyn Transport>,
        credentials: Arc<CredentialManager>,
        reconnect_delay: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Closed);

        let driver = ChannelDriver {
            transport,
            credentials: credentials.clone(),
            registry: SubscriberRegistry::new(),
            stream: None,
            reconnect_at: None,
            reconnect_delay,
            connect_timeout,
            state: state_tx,
        };
        tokio::spawn(driver.run(command_rx));

        Self {
            commands,
            credentials,
            state,
        }
    }

    /// Register a callback, opening the connection for the first subscriber.
    ///
    /// Resolves once the registration and any resulting connection attempt
    /// have been processed.
    pub async fn subscribe(&self, callback: UpdateCallback) -> Result<Subscription, ClientError> {
        // Fail fast rather than looping on reconnects without credentials
        self.credentials.credential().await?;

        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe { callback, reply })?;
        let id = rx.await.map_err(|_| ClientError::ChannelClosed)?;

        Ok(Subscription {
            id,
            commands: self.commands.clone(),
        })
    }

    /// Remove a subscription, closing the connection for the last one.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, ClientError> {
        unsubscribe(&self.commands, id).await
    }

    /// Drop every subscription and close the connection without reconnecting.
    ///
    /// Returns how many subscriptions were removed.
    pub async fn disconnect(&self) -> Result<usize, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Disconnect { reply })?;
        rx.await.map_err(|_| ClientError::ChannelClosed)
    }

    /// Number of registered subscriptions.
    pub async fn subscriber_count(&self) -> Result<usize, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Count { reply })?;
        rx.await.map_err(|_| ClientError::ChannelClosed)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::ChannelClosed)
    }
}

/// A registered callback. Call [`Subscription::unsubscribe`] to remove it.
///
/// Dropping a `Subscription` leaves the callback registered.
pub struct Subscription {
    id: SubscriptionId,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    /// Identifier of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove exactly this subscription.
    ///
    /// Returns false if it was already removed (e.g. by `disconnect`).
    pub async fn unsubscribe(self) -> Result<bool, ClientError> {
        unsubscribe(&self.commands, self.id).await
    }
}

async fn unsubscribe(
    commands: &mpsc::UnboundedSender<Command>,
    id: SubscriptionId,
) -> Result<bool, ClientError> {
    let (reply, rx) = oneshot::channel();
    commands
        .send(Command::Unsubscribe { id, reply })
        .map_err(|_| ClientError::ChannelClosed)?;
    rx.await.map_err(|_| ClientError::ChannelClosed)
}

enum Event {
    Command(Option<Command>),
    Inbound(Option<Result<String, ClientError>>),
    ReconnectDue,
}

struct ChannelDriver {
    transport: Box<dyn Transport>,
    credentials: Arc<CredentialManager>,
    registry: SubscriberRegistry,
    stream: Option<Box<dyn EventStream>>,
    reconnect_at: Option<Instant>,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    state: watch::Sender<ConnectionState>,
}

impl ChannelDriver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let event = tokio::select! {
                biased;
                _ = wait_until(self.reconnect_at) => Event::ReconnectDue,
                command = commands.recv() => Event::Command(command),
                inbound = next_inbound(&mut self.stream) => Event::Inbound(inbound),
            };

            match event {
                Event::Command(Some(command)) => self.handle_command(command).await,
                Event::Command(None) => break,
                Event::Inbound(inbound) => self.handle_inbound(inbound),
                Event::ReconnectDue => {
                    self.reconnect_at = None;
                    info!(transport = %self.transport.kind(), "Reconnecting realtime channel");
                    self.open().await;
                }
            }
        }

        self.close().await;
        debug!("Realtime channel driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe { callback, reply } => {
                let first = self.registry.is_empty();
                let id = self.registry.add(callback);
                debug!(subscription_id = %id, subscribers = self.registry.len(), "Subscribed");
                if first {
                    self.open().await;
                }
                let _ = reply.send(id);
            }
            Command::Unsubscribe { id, reply } => {
                let removed = self.registry.remove(&id);
                debug!(subscription_id = %id, removed, "Unsubscribed");
                if removed && self.registry.is_empty() {
                    self.close().await;
                }
                let _ = reply.send(removed);
            }
            Command::Disconnect { reply } => {
                let removed = self.registry.clear();
                self.close().await;
                info!(subscribers = removed, "Realtime channel disconnected");
                let _ = reply.send(removed);
            }
            Command::Count { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    fn handle_inbound(&mut self, inbound: Option<Result<String, ClientError>>) {
        match inbound {
            Some(Ok(raw)) => match Update::from_json(&raw) {
                Ok(update) => {
                    debug!(subscribers = self.registry.len(), "Dispatching update");
                    self.registry.dispatch(&update);
                }
                Err(e) => {
                    let err = ClientError::from(e);
                    warn!(error = %err, "Dropping malformed realtime message");
                }
            },
            Some(Err(e)) => {
                warn!(error = %e, "Realtime channel error");
                self.on_fault();
            }
            None => {
                warn!("Realtime channel closed by server");
                self.on_fault();
            }
        }
    }

    async fn open(&mut self) {
        if self.stream.is_some() {
            return;
        }
        self.reconnect_at = None;
        self.set_state(ConnectionState::Connecting);

        let result = match self.credentials.realtime_credential().await {
            Ok(credential) => {
                let connect = self.transport.connect(&credential);
                match tokio::time::timeout(self.connect_timeout, connect).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Connection(format!(
                        "connect timed out after {}ms",
                        self.connect_timeout.as_millis()
                    ))),
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(stream) => {
                info!(transport = %self.transport.kind(), "Realtime channel open");
                self.stream = Some(stream);
                self.set_state(ConnectionState::Open);
            }
            Err(e) => {
                warn!(error = %e, "Failed to open realtime channel");
                self.set_state(ConnectionState::Closed);
                self.schedule_reconnect();
            }
        }
    }

    /// Caller-initiated close. Never schedules a reconnect.
    async fn close(&mut self) {
        self.reconnect_at = None;
        if let Some(mut stream) = self.stream.take() {
            stream.close().await;
            info!("Realtime channel closed");
        }
        self.set_state(ConnectionState::Closed);
    }

    fn on_fault(&mut self) {
        self.stream = None;
        self.set_state(ConnectionState::Closed);
        if !self.registry.is_empty() {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
        warn!(
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "Realtime reconnect scheduled"
        );
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

async fn next_inbound(
    stream: &mut Option<Box<dyn EventStream>>,
) -> Option<Result<String, ClientError>> {
    match stream {
        Some(stream) => stream.next_message().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
