//! Chat message models: REST history and live frames share one shape.

use serde::{Deserialize, Serialize};

/// One chat message. `created_at` is kept as the server's string form; the
/// chat service does not emit a uniform timestamp format and the client only
/// displays it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<i64>,
    pub message: String,
    pub username: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Frames the client sends over a chat channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChatOutbound {
    /// Text send: `{"message": "..."}` with no discriminator.
    Message { message: String },
    /// Typing indicator: `{"type": "typing", "is_typing": bool}`.
    Typing {
        #[serde(rename = "type")]
        kind: TypingTag,
        is_typing: bool,
    },
}

/// Literal `"typing"` tag for the typing frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TypingTag {
    Typing,
}

impl ChatOutbound {
    pub fn message(text: impl Into<String>) -> Self {
        ChatOutbound::Message {
            message: text.into(),
        }
    }

    pub fn typing(is_typing: bool) -> Self {
        ChatOutbound::Typing {
            kind: TypingTag::Typing,
            is_typing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_frame_has_no_type_tag() {
        let frame = serde_json::to_value(ChatOutbound::message("hola")).unwrap();
        assert_eq!(frame, serde_json::json!({ "message": "hola" }));
    }

    #[test]
    fn typing_frame_is_tagged() {
        let frame = serde_json::to_value(ChatOutbound::typing(true)).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({ "type": "typing", "is_typing": true })
        );
    }
}
