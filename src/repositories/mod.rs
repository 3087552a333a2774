//! REST collaborators consumed by the realtime layer. Traits here, HTTP
//! implementations in [`rest`]; server internals are out of scope.

pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ClientResult;
use crate::models::booking::{Booking, BookingFilter, BookingStats, NewBooking};
use crate::models::chat::ChatMessage;
use crate::models::grid::AvailabilitySnapshot;
use crate::models::open_match::OpenMatch;

pub use rest::{RestBookingService, RestChatHistoryService, RestClient, RestMatchService};

/// Reservation CRUD and availability snapshots.
#[async_trait]
pub trait BookingService: Send + Sync {
    async fn list_bookings(&self, filter: &BookingFilter) -> ClientResult<Vec<Booking>>;

    /// Create a reservation. The server arbitrates slot ownership: a slot
    /// already taken comes back as [`crate::error::ClientError::Rejected`].
    async fn create_booking(&self, new: &NewBooking) -> ClientResult<Booking>;

    async fn delete_booking(&self, id: i64) -> ClientResult<()>;

    /// Tri-state week snapshot for one court.
    async fn weekly_availability(
        &self,
        court_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ClientResult<AvailabilitySnapshot>;

    async fn stats(&self) -> ClientResult<BookingStats>;
}

/// Open-match listing and membership.
#[async_trait]
pub trait MatchService: Send + Sync {
    async fn list_open_matches(&self) -> ClientResult<Vec<OpenMatch>>;
    async fn join_match(&self, id: i64) -> ClientResult<()>;
    async fn leave_match(&self, id: i64) -> ClientResult<()>;
    async fn cancel_match(&self, id: i64) -> ClientResult<()>;
    async fn remove_participant(&self, id: i64, user_id: i64) -> ClientResult<()>;
}

/// Persisted chat history; live messages come over the chat channel.
#[async_trait]
pub trait ChatHistoryService: Send + Sync {
    async fn list_messages(&self, match_id: i64) -> ClientResult<Vec<ChatMessage>>;
}
