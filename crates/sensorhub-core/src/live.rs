//! Live broadcast channel.
//!
//! [`SubscriberRegistry`] is the process-wide set of live subscribers. It is
//! built once at startup and handed explicitly to the ingestion coordinator
//! (which publishes) and to the connection boundary (which subscribes).
//!
//! Events fan out over one [`broadcast`] channel, so every subscriber reads
//! from its own bounded window and one slow consumer never holds up the
//! rest. A subscriber that falls more than the capacity behind sees a
//! [`RecvError::Lagged`]; the configured [`OverflowPolicy`] decides whether
//! it skips ahead or is cut off.
//!
//! The registry keeps a close handle per subscriber. Removing it from the
//! map ends the subscription even while the receiver is parked in
//! [`Subscription::recv`].
//!
//! [`LiveChannel::subscribe`] registers first and reads the snapshot second.
//! A reading whose publish happens after registration is delivered as a
//! live event, and one whose insert happened before the snapshot read is in the
//! snapshot, so a subscriber that stays connected never misses a reading
//! (it may see one twice).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sensorhub_db::{DbError, ReadingStore};
use sensorhub_types::{LiveEvent, StoredReading, SubscriberId};
use serde::Deserialize;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot};

/// Upper bound on the per-subscriber window.
pub const MAX_SUBSCRIBER_CAPACITY: usize = 1 << 14;

/// What happens when a subscriber falls more than the capacity behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Skip the oldest missed events and keep the subscriber.
    #[default]
    DropOldest,
    /// Close the subscription; the client has to reconnect.
    Disconnect,
}

/// Process-wide registry of live subscribers.
#[derive(Debug)]
pub struct SubscriberRegistry {
    sender: broadcast::Sender<LiveEvent>,
    subscribers: Mutex<BTreeMap<SubscriberId, oneshot::Sender<()>>>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl SubscriberRegistry {
    /// Create an empty registry. `capacity` is the per-subscriber window,
    /// clamped to `1..=MAX_SUBSCRIBER_CAPACITY`.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.clamp(1, MAX_SUBSCRIBER_CAPACITY);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscribers: Mutex::new(BTreeMap::new()),
            capacity,
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SubscriberId, oneshot::Sender<()>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Per-subscriber window as configured. The channel rounds it up to a
    /// power of two.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy applied to lagging subscribers.
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Register a new subscriber. Events published after this returns are
    /// delivered to it.
    pub fn register(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId::new();
        let events = self.sender.subscribe();
        let (close, closed) = oneshot::channel();
        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, close);
            subscribers.len()
        };
        tracing::debug!(subscriber = %id, subscribers = count, "Live subscriber registered");

        Subscription {
            id,
            events,
            closed,
            status: SubscriptionStatus::Open,
            lagged: 0,
            registry: Arc::clone(self),
        }
    }

    /// Deliver `event` to every registered subscriber.
    ///
    /// Returns how many registered subscribers the event was sent to. Zero
    /// is normal when nobody is connected.
    pub fn publish(&self, event: &LiveEvent) -> usize {
        let registered = self.subscriber_count();
        let delivered = if registered == 0 {
            0
        } else {
            // Only fails when no receiver is alive.
            let receivers = self.sender.send(event.clone()).unwrap_or(0);
            registered.min(receivers)
        };

        tracing::trace!(event = event.name(), delivered, "Live event published");
        delivered
    }

    /// Remove a subscriber. Idempotent; returns whether it was registered.
    /// Nothing is delivered to it once this returns.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        // Dropping the close handle wakes the subscriber.
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "Live subscriber unsubscribed");
        }
        removed
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionStatus {
    Open,
    Unsubscribed,
    Overflowed,
}

/// Handle to one live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    events: broadcast::Receiver<LiveEvent>,
    closed: oneshot::Receiver<()>,
    status: SubscriptionStatus,
    lagged: u64,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    /// This subscriber's id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the subscription is
    /// closed (unsubscribed or cut off for lagging).
    ///
    /// Cancel-safe: dropping the future loses no event.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        loop {
            if self.status != SubscriptionStatus::Open {
                return None;
            }
            tokio::select! {
                biased;
                _ = &mut self.closed => {
                    self.status = SubscriptionStatus::Unsubscribed;
                }
                result = self.events.recv() => match result {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(skipped)) => self.on_lagged(skipped),
                    Err(RecvError::Closed) => {
                        self.status = SubscriptionStatus::Unsubscribed;
                    }
                },
            }
        }
    }

    /// Take the next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<LiveEvent> {
        loop {
            if self.status != SubscriptionStatus::Open {
                return None;
            }
            if !matches!(self.closed.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                self.status = SubscriptionStatus::Unsubscribed;
                return None;
            }
            match self.events.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.on_lagged(skipped),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.status = SubscriptionStatus::Unsubscribed;
                }
            }
        }
    }

    fn on_lagged(&mut self, skipped: u64) {
        match self.registry.policy {
            OverflowPolicy::DropOldest => {
                self.lagged = self.lagged.saturating_add(skipped);
                tracing::debug!(subscriber = %self.id, skipped, "Live subscriber lagging, skipped oldest events");
            }
            OverflowPolicy::Disconnect => {
                self.status = SubscriptionStatus::Overflowed;
                self.registry.unsubscribe(self.id);
                tracing::warn!(subscriber = %self.id, skipped, "Live subscriber fell too far behind, disconnecting");
            }
        }
    }

    /// Events skipped for this subscriber since the last call. Lag is
    /// noticed when the subscriber next receives.
    pub fn take_lagged(&mut self) -> u64 {
        std::mem::take(&mut self.lagged)
    }

    /// Whether this subscriber was cut off for falling too far behind.
    pub fn was_overflowed(&self) -> bool {
        self.status == SubscriptionStatus::Overflowed
    }

    /// Stop receiving events. Idempotent.
    pub fn unsubscribe(&self) {
        self.registry.unsubscribe(self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.id);
    }
}

/// Subscribe side of the live channel: registration plus the connect-time
/// snapshot read from the store.
#[derive(Clone)]
pub struct LiveChannel {
    registry: Arc<SubscriberRegistry>,
    store: Arc<dyn ReadingStore>,
    snapshot_size: u64,
}

impl LiveChannel {
    /// Create a channel over a shared registry and store.
    pub const fn new(
        registry: Arc<SubscriberRegistry>,
        store: Arc<dyn ReadingStore>,
        snapshot_size: u64,
    ) -> Self {
        Self {
            registry,
            store,
            snapshot_size,
        }
    }

    /// Register a subscriber, then read the most recent readings for its
    /// initial snapshot.
    ///
    /// The subscription stays registered even if the snapshot read fails;
    /// the caller reports the failure to the client and keeps streaming.
    pub async fn subscribe(&self) -> (Subscription, Result<Vec<StoredReading>, DbError>) {
        let subscription = self.registry.register();
        let snapshot = self.store.list_recent(self.snapshot_size).await;
        if let Err(e) = &snapshot {
            tracing::error!(subscriber = %subscription.id(), error = %e, "Failed to read initial snapshot");
        }
        (subscription, snapshot)
    }

    /// The shared registry.
    pub const fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Number of readings in a connect-time snapshot.
    pub const fn snapshot_size(&self) -> u64 {
        self.snapshot_size
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use sensorhub_db::MemoryReadingStore;
    use sensorhub_types::{NewReading, Parameter, ReadingId};

    use super::*;

    fn reading(sensor: &str) -> StoredReading {
        StoredReading {
            id: ReadingId::new(),
            sensor_id: sensor.to_owned(),
            params: vec![Parameter::new("temp", 1.0, "C")],
            timestamp: Utc::now(),
        }
    }

    fn registry(capacity: usize, policy: OverflowPolicy) -> Arc<SubscriberRegistry> {
        Arc::new(SubscriberRegistry::new(capacity, policy))
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let registry = registry(4, OverflowPolicy::DropOldest);
        assert_eq!(registry.publish(&LiveEvent::AllDeleted), 0);
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event() {
        let registry = registry(8, OverflowPolicy::DropOldest);
        let mut a = registry.register();
        let mut b = registry.register();
        assert_eq!(registry.subscriber_count(), 2);

        let event = LiveEvent::NewReading(reading("s1"));
        assert_eq!(registry.publish(&event), 2);
        assert_eq!(registry.publish(&LiveEvent::AllDeleted), 2);

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await, Some(event.clone()));
            assert_eq!(sub.recv().await, Some(LiveEvent::AllDeleted));
            assert_eq!(sub.try_recv(), None);
        }
    }

    #[tokio::test]
    async fn recv_wakes_on_publish() {
        let registry = registry(8, OverflowPolicy::DropOldest);
        let mut sub = registry.register();

        let publisher = Arc::clone(&registry);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish(&LiveEvent::AllDeleted)
        });

        let got = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap();
        assert_eq!(got, Some(LiveEvent::AllDeleted));
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_oldest_and_counts_lag() {
        let registry = registry(2, OverflowPolicy::DropOldest);
        let mut sub = registry.register();

        let events: Vec<LiveEvent> = (0..4)
            .map(|_| LiveEvent::NewReading(reading("s1")))
            .collect();
        for event in &events {
            assert_eq!(registry.publish(event), 1);
        }

        assert_eq!(sub.recv().await, Some(events[2].clone()));
        assert_eq!(sub.take_lagged(), 2);
        assert_eq!(sub.take_lagged(), 0);
        assert_eq!(sub.recv().await, Some(events[3].clone()));
        assert!(!sub.was_overflowed());
        assert_eq!(registry.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn lagging_subscriber_disconnects_under_disconnect_policy() {
        let registry = registry(1, OverflowPolicy::Disconnect);
        let mut slow = registry.register();
        let mut fast = registry.register();

        assert_eq!(registry.publish(&LiveEvent::AllDeleted), 2);
        assert_eq!(fast.recv().await, Some(LiveEvent::AllDeleted));

        // `slow` never read the first event, so the second puts it behind.
        assert_eq!(registry.publish(&LiveEvent::AllDeleted), 2);
        assert_eq!(slow.recv().await, None);
        assert!(slow.was_overflowed());
        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(slow.try_recv(), None);
        assert_eq!(fast.recv().await, Some(LiveEvent::AllDeleted));
        assert!(!fast.was_overflowed());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_final() {
        let registry = registry(8, OverflowPolicy::DropOldest);
        let mut sub = registry.register();
        registry.publish(&LiveEvent::AllDeleted);

        assert!(registry.unsubscribe(sub.id()));
        assert!(!registry.unsubscribe(sub.id()));
        sub.unsubscribe();

        // Already-sent events are discarded too.
        assert_eq!(sub.recv().await, None);
        assert_eq!(registry.publish(&LiveEvent::AllDeleted), 0);
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn unsubscribe_wakes_a_waiting_receiver() {
        let registry = registry(8, OverflowPolicy::DropOldest);
        let mut sub = registry.register();
        let id = sub.id();

        let handle = tokio::spawn(async move { sub.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(registry.unsubscribe(id));

        let got = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(registry(0, OverflowPolicy::DropOldest).capacity(), 1);
        assert_eq!(
            registry(usize::MAX, OverflowPolicy::Disconnect).capacity(),
            MAX_SUBSCRIBER_CAPACITY
        );
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let registry = registry(8, OverflowPolicy::DropOldest);
        {
            let _sub = registry.register();
            assert_eq!(registry.subscriber_count(), 1);
        }
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_comes_from_the_store() {
        let store = MemoryReadingStore::new();
        for i in 0..12 {
            store
                .insert(NewReading::new(
                    "s1",
                    vec![Parameter::new("temp", f64::from(i), "C")],
                ))
                .await
                .unwrap();
        }

        let registry = registry(8, OverflowPolicy::DropOldest);
        let channel = LiveChannel::new(Arc::clone(&registry), Arc::new(store.clone()), 10);
        let (mut sub, snapshot) = channel.subscribe().await;
        let snapshot = snapshot.unwrap();

        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot, store.list_recent(10).await.unwrap());
        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(sub.try_recv(), None);
    }
}
