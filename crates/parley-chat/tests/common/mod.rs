use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use parley_chat::{Actor, Chat, DEFAULT_STORE_TIMEOUT, SessionDirectory, SessionHandle};
use parley_db::Database;
use parley_types::events::GatewayEvent;
use parley_types::models::Notification;

/// Directory that records every direct push and treats `online` users as connected.
#[derive(Default)]
pub struct RecordingDirectory {
    online: Mutex<HashSet<Uuid>>,
    pushed: Mutex<Vec<(Uuid, GatewayEvent)>>,
    handles: Mutex<HashMap<Uuid, SessionHandle>>,
    left: Mutex<Vec<(Uuid, Uuid)>>,
}

impl RecordingDirectory {
    pub fn set_online(&self, user_id: Uuid) {
        self.online.lock().unwrap().insert(user_id);
    }

    /// Notifications that reached `user_id` live.
    pub fn live_notifications(&self, user_id: Uuid) -> Vec<Notification> {
        let online = self.online.lock().unwrap().contains(&user_id);
        if !online {
            return Vec::new();
        }
        self.pushed
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == user_id)
            .filter_map(|(_, event)| match event {
                GatewayEvent::NotificationNew(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn push_count(&self) -> usize {
        self.pushed.lock().unwrap().len()
    }

    /// `(room_id, conn_id)` pairs removed through `leave_room`.
    pub fn left_rooms(&self) -> Vec<(Uuid, Uuid)> {
        self.left.lock().unwrap().clone()
    }
}

impl SessionDirectory for RecordingDirectory {
    fn register(&self, user_id: Uuid, handle: SessionHandle) {
        self.set_online(user_id);
        self.handles.lock().unwrap().insert(user_id, handle);
    }

    fn unregister(&self, _conn_id: Uuid) {}

    fn lookup(&self, user_id: Uuid) -> Option<SessionHandle> {
        self.handles.lock().unwrap().get(&user_id).cloned()
    }

    fn join_room(&self, _room_id: Uuid, _handle: SessionHandle) {}

    fn leave_room(&self, room_id: Uuid, conn_id: Uuid) {
        self.left.lock().unwrap().push((room_id, conn_id));
    }

    fn room_broadcast(&self, _room_id: Uuid, _event: GatewayEvent) -> usize {
        0
    }

    fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let online = self.online.lock().unwrap().contains(&user_id);
        self.pushed.lock().unwrap().push((user_id, event));
        online
    }
}

pub fn setup() -> (Chat, Arc<RecordingDirectory>) {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    let directory = Arc::new(RecordingDirectory::default());
    let chat = Chat::new(db, directory.clone(), DEFAULT_STORE_TIMEOUT);
    (chat, directory)
}

pub fn actor(name: &str) -> Actor {
    Actor::new(Uuid::new_v4(), name)
}
