//! Realtime change feed
//!
//! A subscription is scoped to one `(identity, record type)` pair and
//! receives an opaque [`ChangeSignal`] whenever any session writes a record
//! of that type for that identity. Signals carry no diff: a consumer is
//! expected to reload the whole list.
//!
//! ```text
//! ┌──────────────┐  publish(alice, conquests)  ┌──────────┐
//! │ remote store │ ──────────────────────────▶ │ FeedHub  │
//! └──────────────┘                             └────┬─────┘
//!                         ┌─────────────────────────┼───────────────────┐
//!                         ▼                         ▼                   ▼
//!               sub(alice, conquests)   sub(alice, conquests)   sub(bob, conquests)
//!                   session A               session B             (not notified)
//! ```

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use ulid::Ulid;

use crate::types::{Identity, RecordType};

/// Unique id of a live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Ulid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// Something changed for `identity`'s records of `record_type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub identity: Identity,
    pub record_type: RecordType,
}

/// What a subscriber needs to keep to unsubscribe later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub identity: Identity,
    pub record_type: RecordType,
}

/// A live subscription: its handle plus the stream of signals
///
/// The stream ends once the subscription is removed from the feed.
#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub signals: mpsc::UnboundedReceiver<ChangeSignal>,
}

/// Inbound change notifications for an identity's records
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, identity: &Identity, record_type: RecordType) -> Subscription;

    /// Remove a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: &SubscriptionHandle);
}

struct Subscriber {
    identity: Identity,
    record_type: RecordType,
    tx: mpsc::UnboundedSender<ChangeSignal>,
}

/// In-process change feed shared by every session talking to one backend
#[derive(Default)]
pub struct FeedHub {
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every subscriber of `(identity, record_type)`.
    ///
    /// Returns how many subscribers were notified. Subscribers whose receiver
    /// has been dropped are pruned.
    pub fn publish(&self, identity: &Identity, record_type: RecordType) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|id, sub| {
            if sub.identity != *identity || sub.record_type != record_type {
                return true;
            }
            let signal = ChangeSignal {
                identity: identity.clone(),
                record_type,
            };
            match sub.tx.send(signal) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    trace!(%id, "Pruning closed subscription");
                    false
                }
            }
        });
        debug!(%identity, %record_type, delivered, "Published change signal");
        delivered
    }

    /// Number of live subscriptions scoped to `identity`
    pub fn live_subscriptions(&self, identity: &Identity) -> usize {
        self.subscribers
            .lock()
            .values()
            .filter(|s| s.identity == *identity && !s.tx.is_closed())
            .count()
    }

    /// Number of live subscriptions across all identities
    pub fn total_subscriptions(&self) -> usize {
        self.subscribers
            .lock()
            .values()
            .filter(|s| !s.tx.is_closed())
            .count()
    }
}

impl ChangeFeed for FeedHub {
    fn subscribe(&self, identity: &Identity, record_type: RecordType) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        self.subscribers.lock().insert(
            id,
            Subscriber {
                identity: identity.clone(),
                record_type,
                tx,
            },
        );
        debug!(%id, %identity, %record_type, "Subscribed to change feed");

        Subscription {
            handle: SubscriptionHandle {
                id,
                identity: identity.clone(),
                record_type,
            },
            signals: rx,
        }
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if self.subscribers.lock().remove(&handle.id).is_some() {
            debug!(id = %handle.id, identity = %handle.identity, "Unsubscribed from change feed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("alice").unwrap()
    }

    fn bob() -> Identity {
        Identity::new("bob").unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers_only() {
        let hub = FeedHub::new();
        let mut a_conquests = hub.subscribe(&alice(), RecordType::Conquests);
        let mut a_favorites = hub.subscribe(&alice(), RecordType::Favorites);
        let mut b_conquests = hub.subscribe(&bob(), RecordType::Conquests);

        assert_eq!(hub.publish(&alice(), RecordType::Conquests), 1);

        let signal = a_conquests.signals.recv().await.unwrap();
        assert_eq!(signal.identity, alice());
        assert_eq!(signal.record_type, RecordType::Conquests);
        assert!(a_favorites.signals.try_recv().is_err());
        assert!(b_conquests.signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_stream() {
        let hub = FeedHub::new();
        let mut sub = hub.subscribe(&alice(), RecordType::Favorites);
        assert_eq!(hub.live_subscriptions(&alice()), 1);

        hub.unsubscribe(&sub.handle);
        assert_eq!(hub.live_subscriptions(&alice()), 0);
        assert!(sub.signals.recv().await.is_none());

        // Second unsubscribe is a no-op
        hub.unsubscribe(&sub.handle);
    }

    #[test]
    fn test_dropped_receivers_are_pruned_on_publish() {
        let hub = FeedHub::new();
        let sub = hub.subscribe(&alice(), RecordType::Conquests);
        drop(sub.signals);

        assert_eq!(hub.live_subscriptions(&alice()), 0);
        assert_eq!(hub.publish(&alice(), RecordType::Conquests), 0);
        assert_eq!(hub.total_subscriptions(), 0);
    }
}
