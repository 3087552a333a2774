//! Channel identity and endpoint derivation.

use std::fmt;

/// One logical live-update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    Bookings,
    Matches,
    /// Per-match chat room.
    Chat(i64),
}

impl ChannelKey {
    pub fn is_chat(&self) -> bool {
        matches!(self, ChannelKey::Chat(_))
    }

    /// Global channels live for the whole process; chat channels are torn
    /// down on last unsubscribe.
    pub fn is_global(&self) -> bool {
        !self.is_chat()
    }

    /// Endpoint path under the WebSocket base.
    pub fn path(&self) -> String {
        match self {
            ChannelKey::Bookings => "/ws/bookings/".to_string(),
            ChannelKey::Matches => "/ws/matches/".to_string(),
            ChannelKey::Chat(match_id) => format!("/ws/chat/{}/", match_id),
        }
    }

    /// Full connection URL. Global channels carry the credential as a query
    /// parameter; chat passes it as the WebSocket subprotocol instead, so its
    /// URL never embeds the token.
    pub fn url(&self, ws_base: &str, token: Option<&str>) -> String {
        let base = ws_base.trim_end_matches('/');
        match (self, token) {
            (ChannelKey::Chat(_), _) | (_, None) => format!("{}{}", base, self.path()),
            (_, Some(token)) => format!("{}{}?token={}", base, self.path(), token),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Bookings => write!(f, "bookings"),
            ChannelKey::Matches => write!(f, "matches"),
            ChannelKey::Chat(match_id) => write!(f, "chat:{}", match_id),
        }
    }
}
