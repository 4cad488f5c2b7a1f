//! Stronghold Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Database
//! - Runtime specifics
//!
//! All types here mirror the records the stronghold orchestration server
//! exposes over its REST API and realtime channel.

pub mod error;
pub mod ids;
pub mod peon;
pub mod status;
pub mod task;
pub mod update;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{PeonId, SubscriptionId, TaskId};
pub use peon::Peon;
pub use status::{PeonStatus, TaskStatus};
pub use task::{NewTask, Task, TaskPayload};
pub use update::Update;
