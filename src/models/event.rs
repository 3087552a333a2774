//! Push events delivered over the live channels.
//!
//! Every inbound frame is a JSON object with a mandatory `type` discriminator.
//! Unknown types decode to [`PushEvent::Unknown`] and are ignored by every
//! consumer; a missing or unparseable discriminator is a parse error handled
//! (logged, dropped) at the channel layer.

use serde::{Deserialize, Serialize};

use crate::error::ClientResult;
use crate::models::booking::{Booking, UserSummary};
use crate::models::chat::ChatMessage;
use crate::models::open_match::{MatchParticipant, OpenMatch};

/// Server-originated message on a live channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    BookingCreated {
        booking: Booking,
    },
    BookingUpdated {
        booking: Booking,
    },
    BookingCancelled {
        booking_id: i64,
    },
    MatchCreated {
        #[serde(rename = "match")]
        open_match: OpenMatch,
    },
    MatchUpdated {
        #[serde(rename = "match")]
        open_match: OpenMatch,
    },
    MatchCancelled {
        match_id: i64,
    },
    MatchDeleted {
        match_id: i64,
    },
    ParticipantJoined {
        match_id: i64,
        user: UserSummary,
        #[serde(default)]
        participants: Vec<MatchParticipant>,
    },
    ParticipantLeft {
        match_id: i64,
        user: UserSummary,
        #[serde(default)]
        participants: Vec<MatchParticipant>,
    },
    ChatMessage(ChatMessage),
    Typing {
        username: String,
        is_typing: bool,
    },
    Error {
        message: String,
    },
    /// Any discriminator this client does not know. Never fatal.
    #[serde(other)]
    Unknown,
}

impl PushEvent {
    /// Decode one inbound text frame.
    pub fn parse(frame: &str) -> ClientResult<Self> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Discriminator for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::BookingCreated { .. } => "booking_created",
            PushEvent::BookingUpdated { .. } => "booking_updated",
            PushEvent::BookingCancelled { .. } => "booking_cancelled",
            PushEvent::MatchCreated { .. } => "match_created",
            PushEvent::MatchUpdated { .. } => "match_updated",
            PushEvent::MatchCancelled { .. } => "match_cancelled",
            PushEvent::MatchDeleted { .. } => "match_deleted",
            PushEvent::ParticipantJoined { .. } => "participant_joined",
            PushEvent::ParticipantLeft { .. } => "participant_left",
            PushEvent::ChatMessage(_) => "chat_message",
            PushEvent::Typing { .. } => "typing",
            PushEvent::Error { .. } => "error",
            PushEvent::Unknown => "unknown",
        }
    }

    /// True for any booking mutation, regardless of which actor caused it.
    /// These are the events that invalidate availability grids.
    pub fn is_booking_mutation(&self) -> bool {
        matches!(
            self,
            PushEvent::BookingCreated { .. }
                | PushEvent::BookingUpdated { .. }
                | PushEvent::BookingCancelled { .. }
        )
    }

    /// True for any open-match mutation, including participant churn.
    pub fn is_match_mutation(&self) -> bool {
        matches!(
            self,
            PushEvent::MatchCreated { .. }
                | PushEvent::MatchUpdated { .. }
                | PushEvent::MatchCancelled { .. }
                | PushEvent::MatchDeleted { .. }
                | PushEvent::ParticipantJoined { .. }
                | PushEvent::ParticipantLeft { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_created_parses() {
        let raw = r#"{
            "type": "booking_created",
            "booking": {
                "id": 5,
                "start_time": "2024-06-10T14:00:00Z",
                "end_time": "2024-06-10T15:00:00Z",
                "status": "pending"
            }
        }"#;
        let event = PushEvent::parse(raw).unwrap();
        assert!(matches!(event, PushEvent::BookingCreated { ref booking } if booking.id == 5));
        assert!(event.is_booking_mutation());
    }

    #[test]
    fn booking_cancelled_parses() {
        let event = PushEvent::parse(r#"{"type": "booking_cancelled", "booking_id": 12}"#).unwrap();
        assert!(matches!(event, PushEvent::BookingCancelled { booking_id: 12 }));
    }

    #[test]
    fn chat_frames_parse() {
        let raw = r#"{
            "type": "chat_message",
            "id": 3,
            "message": "nos vemos",
            "username": "ana",
            "user_id": 7,
            "created_at": "2024-06-10 13:55:02+00:00"
        }"#;
        let event = PushEvent::parse(raw).unwrap();
        match event {
            PushEvent::ChatMessage(msg) => {
                assert_eq!(msg.message, "nos vemos");
                assert_eq!(msg.user_id, Some(7));
            }
            other => panic!("expected chat_message, got {}", other.kind()),
        }

        let event = PushEvent::parse(r#"{"type": "error", "message": "chat closed"}"#).unwrap();
        assert!(matches!(event, PushEvent::Error { .. }));
    }

    #[test]
    fn unknown_type_is_ignored_not_fatal() {
        let event = PushEvent::parse(r#"{"type": "maintenance_window", "at": "soon"}"#).unwrap();
        assert!(matches!(event, PushEvent::Unknown));
        assert!(!event.is_booking_mutation());
    }

    #[test]
    fn missing_type_is_a_parse_error() {
        assert!(PushEvent::parse(r#"{"booking_id": 1}"#).is_err());
        assert!(PushEvent::parse("not json").is_err());
    }
}
