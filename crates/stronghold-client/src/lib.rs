//! Client library for the stronghold task-orchestration server.
//!
//! Provides an authenticated REST gateway and a resilient realtime update
//! channel over WebSocket or server-sent events.

pub mod channel;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod transport;

pub use channel::{ChannelHandle, ConnectionState, Subscription};
pub use client::StrongholdClient;
pub use config::{ClientConfig, CredentialKind, TransportKind};
pub use credential::{Credential, CredentialManager, CredentialStrategy};
pub use error::ClientError;
pub use gateway::{ProbeOutcome, RequestGateway};
pub use registry::{SubscriberRegistry, UpdateCallback};
pub use transport::{EventStream, Transport};

pub use stronghold_core::{
    NewTask, Peon, PeonId, PeonStatus, SubscriptionId, Task, TaskId, TaskStatus, Update,
};
