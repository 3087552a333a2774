//! Slot identity and the client-local pending reservation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One bookable cell in the weekly grid: a date and a start hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub hour: u8,
}

impl SlotKey {
    pub fn new(date: NaiveDate, hour: u8) -> Self {
        Self { date, hour }
    }

    /// Slot start as a UTC instant.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(u32::from(self.hour), 0, 0)
            .unwrap_or_else(|| self.date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
            .and_utc()
    }

    /// Slots are one hour long.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time() + Duration::hours(1)
    }
}

/// Share of the price paid up front when confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentPercentage {
    #[default]
    Full,
    Half,
    Deposit,
}

impl PaymentPercentage {
    pub fn as_u8(self) -> u8 {
        match self {
            PaymentPercentage::Full => 100,
            PaymentPercentage::Half => 50,
            PaymentPercentage::Deposit => 10,
        }
    }

    /// Only 100, 50 and 10 are offered.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            100 => Some(PaymentPercentage::Full),
            50 => Some(PaymentPercentage::Half),
            10 => Some(PaymentPercentage::Deposit),
            _ => None,
        }
    }
}

/// Client-local staging of a slot selection, held between the cell click and
/// the confirm or cancel. Never persisted; at most one per flow.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReservation {
    pub court_id: i64,
    pub slot: SlotKey,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Hourly price of the court, when known.
    pub price: Option<f64>,
    pub payment_percentage: PaymentPercentage,
}

impl PendingReservation {
    pub fn new(court_id: i64, slot: SlotKey, price: Option<f64>) -> Self {
        Self {
            court_id,
            slot,
            start_time: slot.start_time(),
            end_time: slot.end_time(),
            price,
            payment_percentage: PaymentPercentage::default(),
        }
    }

    /// Amount payable now, given the chosen percentage.
    pub fn amount_due(&self) -> Option<f64> {
        self.price
            .map(|p| p * f64::from(self.payment_percentage.as_u8()) / 100.0)
    }
}
