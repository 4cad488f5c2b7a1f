//! Subscriber registry and fan-out.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use stronghold_core::{SubscriptionId, Update};
use tracing::error;

use crate::error::ClientError;

/// Callback invoked for every realtime update.
pub type UpdateCallback = Arc<dyn Fn(&Update) + Send + Sync>;

/// Ordered set of subscriber callbacks.
///
/// Callbacks run in registration order. A panicking callback is isolated
/// so the rest still see the update.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Vec<(SubscriptionId, UpdateCallback)>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback under a fresh id.
    pub fn add(&mut self, callback: UpdateCallback) -> SubscriptionId {
        let mut id = SubscriptionId::generate();
        while self.contains(&id) {
            id = SubscriptionId::generate();
        }
        self.entries.push((id, callback));
        id
    }

    /// Remove a subscription. Returns false if the id was not registered.
    pub fn remove(&mut self, id: &SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| entry_id != id);
        self.entries.len() != before
    }

    /// Remove every subscription, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Check if an id is registered.
    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.entries.iter().any(|(entry_id, _)| entry_id == id)
    }

    /// Number of subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke every callback once with `update`.
    ///
    /// Returns the number of callbacks that panicked.
    pub fn dispatch(&self, update: &Update) -> usize {
        let mut failures = 0;
        for (id, callback) in &self.entries {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(update))) {
                failures += 1;
                let err = ClientError::SubscriberFailure(*id);
                error!(
                    subscription_id = %id,
                    panic = %panic_message(payload.as_ref()),
                    "{}", err
                );
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
