//! In-process event bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{EventKind, Outcome, SyncEvent};
use crate::error::Error;

/// Receiver of published events.
///
/// Subscribers must not publish from `handle`; writes they make go straight
/// to the stores.
pub trait Subscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Event kinds this subscriber receives.
    fn kinds(&self) -> &[EventKind];

    /// Handle one event.
    fn handle(&self, event: &SyncEvent) -> Result<Outcome, Error>;
}

/// Dispatches events to subscribers in subscription order.
pub struct EventBus {
    /// Subscribers keyed by subscription id.
    subscribers: RwLock<HashMap<u64, Arc<dyn Subscriber>>>,
    /// Subscription ids by event kind.
    kind_index: RwLock<HashMap<EventKind, Vec<u64>>>,
    /// Next subscription id.
    next_subscription_id: AtomicU64,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            kind_index: RwLock::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to the kinds the subscriber declares. Returns the subscription id.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> u64 {
        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);

        {
            let mut index = self.kind_index.write();
            for kind in subscriber.kinds() {
                index.entry(*kind).or_default().push(subscription_id);
            }
        }

        tracing::debug!(
            subscription_id,
            subscriber = subscriber.name(),
            "subscriber registered"
        );
        self.subscribers.write().insert(subscription_id, subscriber);
        subscription_id
    }

    /// Remove a subscription. Returns false if it did not exist.
    pub fn unsubscribe(&self, subscription_id: u64) -> bool {
        if self.subscribers.write().remove(&subscription_id).is_none() {
            return false;
        }

        let mut index = self.kind_index.write();
        index.retain(|_, ids| {
            ids.retain(|&id| id != subscription_id);
            !ids.is_empty()
        });
        true
    }

    /// Deliver an event to every subscriber of its kind.
    ///
    /// Stops at the first failing subscriber.
    pub fn publish(&self, event: &SyncEvent) -> Result<Vec<Outcome>, Error> {
        let kind = event.kind();
        let targets: Vec<Arc<dyn Subscriber>> = {
            let index = self.kind_index.read();
            let subscribers = self.subscribers.read();
            match index.get(&kind) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| subscribers.get(id).cloned())
                    .collect(),
                None => return Ok(Vec::new()),
            }
        };

        let mut outcomes = Vec::with_capacity(targets.len());
        for subscriber in targets {
            let outcome = subscriber.handle(event)?;
            tracing::trace!(
                subscriber = subscriber.name(),
                event = ?kind,
                outcome = ?outcome,
                "event handled"
            );
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
