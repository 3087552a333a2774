//! Booking entities as served by the booking service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side reservation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// A reservation owned by the server. The client never assigns ids; bookings
/// only come back from the service or arrive inside push events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(default)]
    pub court_details: Option<CourtSummary>,
    #[serde(default)]
    pub user_details: Option<UserSummary>,
    /// Payment reference, unset until a payment exists.
    #[serde(default)]
    pub payment: Option<i64>,
    #[serde(default)]
    pub payment_percentage: Option<u8>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Court fields embedded in booking payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourtSummary {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// User fields embedded in booking payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl Booking {
    /// Court id regardless of how much detail the payload embedded.
    pub fn court_id(&self) -> Option<i64> {
        self.court_details.as_ref().map(|c| c.id)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_details.as_ref().map(|u| u.id)
    }
}

/// Create-reservation payload. Field names match the booking service wire
/// format (`court`, not `court_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub court: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub payment_percentage: u8,
}

/// Aggregate counters from the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingStats {
    pub total_bookings: u64,
    pub percentage_change: f64,
}

/// Filter for listing bookings. Empty filter lists everything the caller may see.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub court_id: Option<i64>,
    pub status: Option<BookingStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_deserializes_from_service_payload() {
        let raw = r#"{
            "id": 42,
            "user_details": {"id": 7, "username": "ana"},
            "court_details": {"id": 3, "name": "Central"},
            "start_time": "2024-06-10T14:00:00Z",
            "end_time": "2024-06-10T15:00:00Z",
            "status": "confirmed",
            "payment": null,
            "created_at": "2024-06-01T09:30:00Z"
        }"#;
        let booking: Booking = serde_json::from_str(raw).unwrap();
        assert_eq!(booking.id, 42);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.court_id(), Some(3));
        assert_eq!(booking.user_id(), Some(7));
        assert!(booking.payment.is_none());
    }

    #[test]
    fn booking_tolerates_minimal_payload() {
        let raw = r#"{
            "id": 1,
            "start_time": "2024-06-10T14:00:00Z",
            "end_time": "2024-06-10T15:00:00Z",
            "status": "pending"
        }"#;
        let booking: Booking = serde_json::from_str(raw).unwrap();
        assert_eq!(booking.court_id(), None);
        assert_eq!(booking.payment_percentage, None);
    }

    #[test]
    fn new_booking_serializes_wire_names() {
        let payload = NewBooking {
            court: 3,
            start_time: "2024-06-10T14:00:00Z".parse().unwrap(),
            end_time: "2024-06-10T15:00:00Z".parse().unwrap(),
            payment_percentage: 50,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["court"], 3);
        assert_eq!(value["payment_percentage"], 50);
        assert!(value.get("court_id").is_none());
    }
}
