use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::Notification;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is registered
    #[serde(rename = "ready", rename_all = "camelCase")]
    Ready { user_id: Uuid },

    /// Live mirror of a direct message
    #[serde(rename = "chat:private", rename_all = "camelCase")]
    ChatPrivate { message: Value, from_user_id: Uuid },

    /// Live mirror of a group message, delivered to everyone in the room
    #[serde(rename = "chat:group", rename_all = "camelCase")]
    ChatGroup {
        message: Value,
        from_user_id: Uuid,
        room_id: Uuid,
    },

    /// A notification was persisted for this user
    #[serde(rename = "notification:new")]
    NotificationNew(Notification),
}

impl GatewayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::ChatPrivate { .. } => "chat:private",
            Self::ChatGroup { .. } => "chat:group",
            Self::NotificationNew(_) => "notification:new",
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Announce the user id behind this connection
    #[serde(rename = "user:connect", rename_all = "camelCase")]
    UserConnect { user_id: Uuid },

    /// Start receiving `chat:group` events for a thread
    #[serde(rename = "room:join", rename_all = "camelCase")]
    RoomJoin { room_id: Uuid },

    #[serde(rename = "chat:private", rename_all = "camelCase")]
    ChatPrivate {
        to_user_id: Uuid,
        message: Value,
        from_user_id: Uuid,
    },

    #[serde(rename = "chat:group", rename_all = "camelCase")]
    ChatGroup {
        room_id: Uuid,
        message: Value,
        from_user_id: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_socket_commands() {
        let user = Uuid::new_v4();
        let raw = json!({
            "type": "chat:private",
            "data": { "toUserId": user, "fromUserId": user, "message": { "text": "hey" } }
        });
        match serde_json::from_value::<GatewayCommand>(raw).unwrap() {
            GatewayCommand::ChatPrivate { to_user_id, message, .. } => {
                assert_eq!(to_user_id, user);
                assert_eq!(message["text"], "hey");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn group_event_carries_room() {
        let room = Uuid::new_v4();
        let event = GatewayEvent::ChatGroup {
            message: json!("yo"),
            from_user_id: Uuid::nil(),
            room_id: room,
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "chat:group");
        assert_eq!(v["data"]["roomId"], room.to_string());
        assert_eq!(event.name(), "chat:group");
    }
}
