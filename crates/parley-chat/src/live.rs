//! Seam between the core and whatever holds live connections.
//!
//! The core only ever pushes; it never waits on a client. An in-process
//! implementation lives in `parley-gateway`; a distributed one can replace it
//! without touching the core.

use tokio::sync::mpsc;
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// One live connection. Cloning shares the same outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl SessionHandle {
    /// New handle with a fresh connection id, plus the receiving end the
    /// connection task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Fire-and-forget. Returns false if the connection is already gone.
    pub fn push(&self, event: GatewayEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Registry of connected users and the rooms their connections joined.
/// One active connection per user: registering again replaces the old handle.
pub trait SessionDirectory: Send + Sync {
    fn register(&self, user_id: Uuid, handle: SessionHandle);

    /// Remove everything owned by this connection. A newer connection for the
    /// same user is left alone.
    fn unregister(&self, conn_id: Uuid);

    fn lookup(&self, user_id: Uuid) -> Option<SessionHandle>;

    fn join_room(&self, room_id: Uuid, handle: SessionHandle);

    /// Drop one connection from a room. Unknown rooms and connections are ignored.
    fn leave_room(&self, room_id: Uuid, conn_id: Uuid);

    /// Push to every connection in the room. Returns how many accepted the event.
    fn room_broadcast(&self, room_id: Uuid, event: GatewayEvent) -> usize;

    /// Direct delivery. An offline user is a silent no-op.
    fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        match self.lookup(user_id) {
            Some(handle) => handle.push(event),
            None => false,
        }
    }
}
