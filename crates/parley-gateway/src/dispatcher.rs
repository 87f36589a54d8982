use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;
use uuid::Uuid;

use parley_chat::{SessionDirectory, SessionHandle};
use parley_types::events::GatewayEvent;

/// In-process session directory: who is connected and which rooms each
/// connection joined.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> handle of that user's current connection
    users: RwLock<HashMap<Uuid, SessionHandle>>,

    /// room_id -> (conn_id -> handle)
    rooms: RwLock<HashMap<Uuid, HashMap<Uuid, SessionHandle>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn online_count(&self) -> usize {
        self.inner
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn room_size(&self, room_id: Uuid) -> usize {
        self.inner
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&room_id)
            .map_or(0, HashMap::len)
    }
}

impl SessionDirectory for Dispatcher {
    fn register(&self, user_id: Uuid, handle: SessionHandle) {
        let conn_id = handle.conn_id();
        let replaced = self
            .inner
            .users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, handle);
        if let Some(old) = replaced {
            debug!(
                "Connection {} replaces {} for user {}",
                conn_id,
                old.conn_id(),
                user_id
            );
        }
    }

    fn unregister(&self, conn_id: Uuid) {
        self.inner
            .users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, handle| handle.conn_id() != conn_id);

        let mut rooms = self
            .inner
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    fn lookup(&self, user_id: Uuid) -> Option<SessionHandle> {
        self.inner
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }

    fn join_room(&self, room_id: Uuid, handle: SessionHandle) {
        self.inner
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room_id)
            .or_default()
            .insert(handle.conn_id(), handle);
    }

    fn leave_room(&self, room_id: Uuid, conn_id: Uuid) {
        let mut rooms = self
            .inner
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(members) = rooms.get_mut(&room_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    fn room_broadcast(&self, room_id: Uuid, event: GatewayEvent) -> usize {
        let rooms = self
            .inner
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(members) = rooms.get(&room_id) else {
            return 0;
        };
        members
            .values()
            .filter(|handle| handle.push(event.clone()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::Ready { user_id }
    }

    #[test]
    fn test_send_to_offline_user_is_noop() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.send_to_user(Uuid::new_v4(), ready(Uuid::nil())));
    }

    #[test]
    fn test_latest_connection_wins() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (first, mut first_rx) = SessionHandle::channel();
        let (second, mut second_rx) = SessionHandle::channel();

        dispatcher.register(user, first.clone());
        dispatcher.register(user, second.clone());
        assert!(dispatcher.send_to_user(user, ready(user)));
        assert!(first_rx.try_recv().is_err());
        assert!(second_rx.try_recv().is_ok());

        // The stale connection closing must not evict the new one.
        dispatcher.unregister(first.conn_id());
        assert_eq!(dispatcher.online_count(), 1);
        assert!(dispatcher.send_to_user(user, ready(user)));

        dispatcher.unregister(second.conn_id());
        assert_eq!(dispatcher.online_count(), 0);
        assert!(dispatcher.lookup(user).is_none());
    }

    #[test]
    fn test_room_broadcast_reaches_joined_connections() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let (a, mut a_rx) = SessionHandle::channel();
        let (b, mut b_rx) = SessionHandle::channel();
        let (_c, mut c_rx) = SessionHandle::channel();

        dispatcher.join_room(room, a.clone());
        dispatcher.join_room(room, b.clone());
        dispatcher.join_room(room, a.clone());
        assert_eq!(dispatcher.room_size(room), 2);

        assert_eq!(dispatcher.room_broadcast(room, ready(Uuid::nil())), 2);
        assert!(a_rx.try_recv().is_ok());
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());
        assert!(c_rx.try_recv().is_err());

        dispatcher.unregister(a.conn_id());
        dispatcher.unregister(b.conn_id());
        assert_eq!(dispatcher.room_size(room), 0);
        assert_eq!(dispatcher.room_broadcast(room, ready(Uuid::nil())), 0);
    }

    #[test]
    fn test_leave_room_stops_broadcasts() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let (a, mut a_rx) = SessionHandle::channel();
        let (b, mut b_rx) = SessionHandle::channel();
        dispatcher.join_room(room, a.clone());
        dispatcher.join_room(room, b.clone());

        dispatcher.leave_room(room, a.conn_id());
        assert_eq!(dispatcher.room_broadcast(room, ready(Uuid::nil())), 1);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());

        dispatcher.leave_room(room, b.conn_id());
        dispatcher.leave_room(Uuid::new_v4(), b.conn_id());
        assert_eq!(dispatcher.room_size(room), 0);
    }

    #[test]
    fn test_closed_receiver_counts_as_undelivered() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (handle, rx) = SessionHandle::channel();
        dispatcher.register(user, handle);
        drop(rx);
        assert!(!dispatcher.send_to_user(user, ready(user)));
    }
}
