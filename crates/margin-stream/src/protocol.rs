//! Realtime service wire messages

use serde::Deserialize;
use serde_json::{Value, json};

use margin_core::Annotation;
use margin_store::{Profile, RealtimeBatch};

use crate::error::StreamResult;

/// Config key for the client identity message
pub const CLIENT_ID_KEY: &str = "client-id";

/// Config key for the authentication check
pub const AUTH_CHECK_KEY: &str = "auth-check";

/// Messages the client sends to configure its stream
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Identifies this client so its own writes are not echoed back
    ClientId(String),
    /// Asks the service which user the socket is authenticated as
    WhoAmI,
}

impl ClientMessage {
    pub fn to_json(&self) -> Value {
        match self {
            ClientMessage::ClientId(id) => json!({ "messageType": "client_id", "value": id }),
            ClientMessage::WhoAmI => json!({ "type": "whoami", "id": 1 }),
        }
    }
}

/// What happened to the annotations in a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Create,
    Update,
    /// Replayed from before the socket opened
    Past,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationOptions {
    pub action: NotificationAction,
}

/// Messages the service pushes to the client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    AnnotationNotification {
        options: NotificationOptions,
        #[serde(default)]
        payload: Vec<Annotation>,
    },
    SessionChange {
        model: Profile,
    },
    #[serde(rename = "whoyouare")]
    WhoYouAre {
        #[serde(default)]
        userid: Option<String>,
    },
    /// A type this client does not handle
    #[serde(skip)]
    Unsupported(String),
}

impl ServerMessage {
    /// Parse one text frame. `null` frames yield `None`.
    pub fn parse(text: &str) -> StreamResult<Option<Self>> {
        let value: Value = serde_json::from_str(text)?;
        if value.is_null() {
            return Ok(None);
        }
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match kind.as_str() {
            "annotation-notification" | "session-change" | "whoyouare" => {
                Ok(Some(serde_json::from_value(value)?))
            }
            _ => Ok(Some(ServerMessage::Unsupported(kind))),
        }
    }
}

impl NotificationAction {
    /// Store batch for a notification carrying `payload`
    pub fn into_batch(self, payload: Vec<Annotation>) -> RealtimeBatch {
        match self {
            NotificationAction::Create | NotificationAction::Update | NotificationAction::Past => {
                RealtimeBatch {
                    updated: payload,
                    deleted: Vec::new(),
                }
            }
            NotificationAction::Delete => RealtimeBatch {
                updated: Vec::new(),
                deleted: payload.iter().filter_map(Annotation::identity).collect(),
            },
        }
    }
}
