//! Wire types of the HTTP front end.

use crate::notify::Notification;
use crate::server::CommandReply;
use actix_web::web::Bytes;
use serde::{Deserialize, Serialize};

/// Body returned by `POST /start` and `POST /stop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Reply kind, e.g. `started` or `rejected`
    pub reply: String,
    /// Human-readable reply text
    pub message: String,
}

impl From<&CommandReply> for CommandResponse {
    fn from(reply: &CommandReply) -> Self {
        Self {
            reply: reply.kind().to_string(),
            message: reply.to_string(),
        }
    }
}

/// Server-Sent Event message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Event type
    pub event: String,
    /// Event data as JSON string
    pub data: String,
    /// Optional event ID
    pub id: Option<String>,
}

impl EventMessage {
    /// Build the event for one lifecycle notification.
    ///
    /// The event type is the notification kind; the data carries the
    /// notification itself plus its rendered message.
    pub fn from_notification(notification: &Notification) -> Self {
        let data = serde_json::json!({
            "server": notification.server,
            "event": notification.event,
            "message": notification.to_string(),
        });

        Self {
            event: notification.event.kind().to_string(),
            data: data.to_string(),
            id: Some(notification.id.to_string()),
        }
    }

    /// Format the message in SSE wire format
    pub fn to_bytes(&self) -> Bytes {
        let mut result = String::new();

        if let Some(id) = &self.id {
            result.push_str(&format!("id: {}\n", id));
        }

        result.push_str(&format!("event: {}\n", self.event));
        result.push_str(&format!("data: {}\n\n", self.data));

        Bytes::from(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LifecycleEvent;

    #[test]
    fn test_command_response_from_reply() {
        let response = CommandResponse::from(&CommandReply::NotRunning);
        assert_eq!(response.reply, "not_running");
        assert_eq!(response.message, "Server is not running.");
    }

    #[test]
    fn test_event_message_wire_format() {
        let notification = Notification::new("Minecraft", LifecycleEvent::StoppedIdle);
        let message = EventMessage::from_notification(&notification);
        assert_eq!(message.event, "stopped_idle");

        let wire = String::from_utf8(message.to_bytes().to_vec()).unwrap();
        assert!(wire.starts_with(&format!("id: {}\n", notification.id)));
        assert!(wire.contains("event: stopped_idle\n"));
        assert!(wire.contains("stopped due to inactivity"));
        assert!(wire.ends_with("\n\n"));
    }
}
