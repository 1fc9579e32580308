//! Call-state event source and scoped subscriptions
//!
//! The host's telephony layer delivers [`CallState`] notifications on its own
//! thread. A session registers a listener channel with a [`CallStateSource`]
//! and holds the returned [`Subscription`] guard; the guard unregisters the
//! listener exactly once, either explicitly on teardown or when dropped.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::CallTagResult;
use crate::types::CallState;

/// Channel a source pushes call states into
pub type CallStateListener = mpsc::UnboundedSender<CallState>;

/// Identifier of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Source of call-state notifications
///
/// States must be delivered in the order they happen. `unsubscribe` must be
/// idempotent: unregistering an unknown or already removed id is a no-op.
pub trait CallStateSource: Send + Sync {
    /// Register `listener` for state notifications
    fn subscribe(&self, listener: CallStateListener) -> CallTagResult<SubscriptionId>;

    /// Unregister a listener
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Scoped registration with a [`CallStateSource`]
///
/// Released once: the first `release` unsubscribes, later calls and the drop
/// glue do nothing.
pub struct Subscription {
    source: Arc<dyn CallStateSource>,
    id: SubscriptionId,
    released: bool,
}

impl Subscription {
    /// Subscribe to `source`, returning the guard and the receiving end
    pub fn acquire(
        source: Arc<dyn CallStateSource>,
    ) -> CallTagResult<(Self, mpsc::UnboundedReceiver<CallState>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = source.subscribe(tx)?;
        debug!("Subscribed to call state events as {}", id);
        Ok((
            Self {
                source,
                id,
                released: false,
            },
            rx,
        ))
    }

    /// Registration id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the listener has been unregistered
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Unregister the listener; returns false if it was already released
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.source.unsubscribe(self.id);
        debug!("Unsubscribed {} from call state events", self.id);
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

/// Fan-out call-state source the host pushes notifications into
///
/// Suitable as the bridge between a platform telephony callback and the
/// coordinator: the platform callback calls [`publish`](Self::publish) and
/// every live session receives the state in order.
#[derive(Debug, Default)]
pub struct BroadcastCallStateSource {
    listeners: DashMap<SubscriptionId, CallStateListener>,
    next_id: AtomicU64,
}

impl BroadcastCallStateSource {
    /// Create a source with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `state` to every listener, returning how many received it
    ///
    /// Listeners whose receiving end is gone are pruned.
    pub fn publish(&self, state: CallState) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.listeners.iter() {
            if entry.value().send(state).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            trace!("Pruning closed listener {}", id);
            self.listeners.remove(&id);
        }
        debug!("Published {} to {} listener(s)", state, delivered);
        delivered
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl CallStateSource for BroadcastCallStateSource {
    fn subscribe(&self, listener: CallStateListener) -> CallTagResult<SubscriptionId> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(&id);
    }
}
