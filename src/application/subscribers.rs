//! Subscriber registry: fan-out of one user's session events to N observers.
//!
//! Rooms are keyed by user, not by connection. Every browser tab a user has
//! open joins the same room and sees the same ordered event stream.
//!
//! ```text
//! Room: user-a          Room: user-b
//! ├── tab 1             ├── tab 1
//! ├── tab 2             └── tab 2
//! └── tab 3
//! ```
//!
//! Events broadcast for user-a never reach user-b's tabs.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::foundation::UserId;
use crate::domain::session::SessionEvent;

/// Unique identifier for one observer connection, generated server-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Create a new random observer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks live observers per user and delivers session events to them.
///
/// Uses `RwLock` over the room map since broadcasts (reads) vastly outnumber
/// joins and leaves (writes); broadcasts to different users proceed
/// concurrently. Within one room a `tokio::sync::broadcast` channel gives
/// every receiver the same ordered stream; a receiver that lags past the
/// channel capacity drops old events without stalling the others.
pub struct SubscriberRegistry {
    /// Map of user_id → broadcast sender for that user's room.
    rooms: RwLock<HashMap<UserId, broadcast::Sender<SessionEvent>>>,

    /// Map of observer_id → user_id for O(1) cleanup on disconnect.
    observer_rooms: RwLock<HashMap<ObserverId, UserId>>,

    /// Channel capacity for each room.
    channel_capacity: usize,
}

impl SubscriberRegistry {
    /// Create a registry with the given per-room channel capacity.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            observer_rooms: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    /// Create with default capacity (128 events).
    pub fn with_default_capacity() -> Self {
        Self::new(128)
    }

    /// Join an observer to a user's room, creating the room if needed.
    ///
    /// Returns a receiver positioned at the current end of the stream: late
    /// joiners see no backlog of past events, only what is broadcast from now
    /// on. Callers that need the current session state send a synthetic
    /// state-sync to the new connection directly.
    pub async fn subscribe(
        &self,
        user_id: &UserId,
        observer_id: ObserverId,
    ) -> broadcast::Receiver<SessionEvent> {
        let mut rooms = self.rooms.write().await;

        let sender = rooms.entry(*user_id).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.channel_capacity);
            tx
        });

        self.observer_rooms
            .write()
            .await
            .insert(observer_id, *user_id);

        sender.subscribe()
    }

    /// Remove an observer from its room.
    ///
    /// An empty room is pruned, but the user's session record lives on: a
    /// user may reconnect later and resume watching the same live session.
    pub async fn unsubscribe(&self, observer_id: &ObserverId) {
        let mut observer_rooms = self.observer_rooms.write().await;

        if let Some(user_id) = observer_rooms.remove(observer_id) {
            let rooms = self.rooms.read().await;
            if let Some(sender) = rooms.get(&user_id) {
                if sender.receiver_count() == 0 {
                    drop(rooms);
                    self.rooms.write().await.remove(&user_id);
                }
            }
        }
    }

    /// Deliver an event to every observer currently in the user's room.
    ///
    /// A room with zero observers is a no-op; the event is not retained for
    /// later delivery. A dead or slow receiver never blocks the others.
    pub async fn broadcast(&self, user_id: &UserId, event: SessionEvent) {
        let rooms = self.rooms.read().await;

        if let Some(sender) = rooms.get(user_id) {
            // Send errors mean no live receivers, which is fine.
            let _ = sender.send(event);
        }
    }

    /// Number of observers currently watching a user's session.
    pub async fn observer_count(&self, user_id: &UserId) -> usize {
        let rooms = self.rooms.read().await;
        rooms
            .get(user_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Total observers across all rooms.
    pub async fn total_observers(&self) -> usize {
        self.observer_rooms.read().await.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn qr_event() -> SessionEvent {
        SessionEvent::QrCode {
            qr_code: "data:image/png;base64,abc".to_string(),
        }
    }

    #[tokio::test]
    async fn subscribe_creates_room_and_receives_broadcast() {
        let registry = Arc::new(SubscriberRegistry::with_default_capacity());
        let user = UserId::new();

        let mut rx = registry.subscribe(&user, ObserverId::new()).await;
        registry.broadcast(&user, qr_event()).await;

        assert_eq!(rx.recv().await.unwrap(), qr_event());
    }

    #[tokio::test]
    async fn all_observers_of_one_user_receive_the_event() {
        let registry = Arc::new(SubscriberRegistry::with_default_capacity());
        let user = UserId::new();

        let mut rx1 = registry.subscribe(&user, ObserverId::new()).await;
        let mut rx2 = registry.subscribe(&user, ObserverId::new()).await;

        registry.broadcast(&user, SessionEvent::CheckComplete).await;

        assert_eq!(rx1.recv().await.unwrap(), SessionEvent::CheckComplete);
        assert_eq!(rx2.recv().await.unwrap(), SessionEvent::CheckComplete);
    }

    #[tokio::test]
    async fn events_never_cross_user_rooms() {
        let registry = SubscriberRegistry::with_default_capacity();
        let user_a = UserId::new();
        let user_b = UserId::new();

        let mut rx_a = registry.subscribe(&user_a, ObserverId::new()).await;
        let mut rx_b = registry.subscribe(&user_b, ObserverId::new()).await;

        registry.broadcast(&user_a, qr_event()).await;

        assert_eq!(rx_a.recv().await.unwrap(), qr_event());
        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn broadcast_with_zero_observers_is_noop_and_keeps_no_backlog() {
        let registry = SubscriberRegistry::with_default_capacity();
        let user = UserId::new();

        // No room exists yet; nothing should panic.
        registry.broadcast(&user, qr_event()).await;

        // A joiner after the fact sees only what comes next.
        let mut rx = registry.subscribe(&user, ObserverId::new()).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        registry.broadcast(&user, SessionEvent::Disconnected).await;
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Disconnected);
    }

    #[tokio::test]
    async fn unsubscribe_prunes_empty_room() {
        let registry = SubscriberRegistry::with_default_capacity();
        let user = UserId::new();
        let observer = ObserverId::new();

        {
            let _rx = registry.subscribe(&user, observer.clone()).await;
            assert_eq!(registry.total_observers().await, 1);
        }

        registry.unsubscribe(&observer).await;
        assert_eq!(registry.total_observers().await, 0);
        assert_eq!(registry.observer_count(&user).await, 0);
    }

    #[tokio::test]
    async fn events_arrive_in_broadcast_order() {
        let registry = SubscriberRegistry::with_default_capacity();
        let user = UserId::new();
        let mut rx = registry.subscribe(&user, ObserverId::new()).await;

        registry
            .broadcast(
                &user,
                SessionEvent::CheckStart {
                    number: "628111".into(),
                },
            )
            .await;
        registry.broadcast(&user, SessionEvent::CheckComplete).await;

        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::CheckStart { .. }
        ));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::CheckComplete);
    }
}
