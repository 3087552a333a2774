//! Open match entities consumed by the matches refetch path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::booking::UserSummary;

/// Lifecycle of an open match looking for players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Open,
    Full,
    Cancelled,
    Completed,
}

/// A match created by a player to fill remaining spots. Mutations go through
/// the match service; this side only lists and re-renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMatch {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub players_needed: u32,
    pub status: MatchStatus,
    #[serde(default)]
    pub creator: Option<UserSummary>,
    #[serde(default)]
    pub participants: Vec<MatchParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchParticipant {
    pub user: UserSummary,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl OpenMatch {
    /// Spots still unfilled, saturating at zero once the match is full.
    pub fn spots_left(&self) -> u32 {
        (self.players_needed as usize)
            .saturating_sub(self.participants.len())
            .try_into()
            .unwrap_or(0)
    }

    pub fn is_joinable(&self) -> bool {
        self.status == MatchStatus::Open && self.spots_left() > 0
    }
}
