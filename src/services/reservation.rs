//! Slot selection and the booking conflict protocol.
//!
//! Selection is purely local; confirmation sends exactly one
//! create-reservation request; and the grid is never patched optimistically —
//! after any mutation, local or remote, the week is refetched so the cells
//! always show server truth. The server is the single arbiter of slot
//! ownership.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{ClientError, ClientResult};
use crate::models::booking::{Booking, NewBooking};
use crate::models::event::PushEvent;
use crate::models::grid::{Availability, AvailabilityGrid, CellState};
use crate::models::slot::{PaymentPercentage, PendingReservation, SlotKey};
use crate::repositories::BookingService;

/// Why a cell could not be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("slot is occupied")]
    Occupied,
    #[error("slot has no availability data")]
    Undefined,
    #[error("slot already started")]
    Expired,
}

/// Terminal result of one confirm call.
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// Reservation accepted; pending cleared and the grid refetched.
    Confirmed(Booking),
    /// The caller must authenticate before retrying; distinct from a
    /// rejection because the UI redirects instead of showing an error.
    AuthRequired,
    /// The service said no (slot taken, validation). Pending cleared; any
    /// retry is a fresh user-initiated selection.
    Rejected(String),
    /// Some other failure; pending cleared.
    Failed(ClientError),
    /// A confirm was already in flight; nothing was sent.
    InFlight,
    /// There was no pending reservation to confirm.
    NothingPending,
}

struct FlowState {
    week_start: NaiveDate,
    grid: AvailabilityGrid,
    pending: Option<PendingReservation>,
    payment_percentage: PaymentPercentage,
    last_confirmed: Option<Booking>,
}

/// One court's booking view: the displayed week, its grid, and at most one
/// pending reservation. Owned by a single view session and discarded on
/// teardown, never shared across sessions.
pub struct ReservationFlow {
    booking: Arc<dyn BookingService>,
    court_id: i64,
    court_price: Option<f64>,
    state: RwLock<FlowState>,
    confirm_in_flight: AtomicBool,
}

impl ReservationFlow {
    pub fn new(
        booking: Arc<dyn BookingService>,
        court_id: i64,
        court_price: Option<f64>,
        week_start: NaiveDate,
    ) -> Self {
        Self {
            booking,
            court_id,
            court_price,
            state: RwLock::new(FlowState {
                week_start,
                grid: AvailabilityGrid::empty(week_start),
                pending: None,
                payment_percentage: PaymentPercentage::default(),
                last_confirmed: None,
            }),
            confirm_in_flight: AtomicBool::new(false),
        }
    }

    pub fn court_id(&self) -> i64 {
        self.court_id
    }

    pub async fn week_start(&self) -> NaiveDate {
        self.state.read().await.week_start
    }

    /// Current grid, cloned for rendering.
    pub async fn grid(&self) -> AvailabilityGrid {
        self.state.read().await.grid.clone()
    }

    pub async fn pending(&self) -> Option<PendingReservation> {
        self.state.read().await.pending.clone()
    }

    pub async fn last_confirmed(&self) -> Option<Booking> {
        self.state.read().await.last_confirmed.clone()
    }

    /// Classify one cell, selection overlay included.
    pub async fn classify(&self, date: NaiveDate, hour: u8, now: DateTime<Utc>) -> CellState {
        let state = self.state.read().await;
        let selected = state.pending.as_ref().map(|p| p.slot);
        state.grid.classify(date, hour, now, selected)
    }

    /// Refetch the displayed week wholesale. Also the target of push-driven
    /// invalidation: after any booking mutation anywhere, the fresh snapshot
    /// is what makes a concurrently-taken slot unselectable here.
    pub async fn refresh_grid(&self) -> ClientResult<()> {
        let week_start = self.state.read().await.week_start;
        let start = week_start
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();
        let end = (week_start + Days::new(6))
            .and_hms_opt(23, 59, 59)
            .expect("valid time")
            .and_utc();

        let snapshot = self
            .booking
            .weekly_availability(self.court_id, start, end)
            .await?;

        let mut state = self.state.write().await;
        // The user may have navigated weeks while the fetch was in flight;
        // a snapshot for a week no longer displayed is dropped.
        if state.week_start == week_start {
            state.grid = AvailabilityGrid::from_snapshot(week_start, snapshot);
        }
        Ok(())
    }

    /// Stage a reservation for a cell. Local only: no network happens until
    /// [`confirm`](Self::confirm). Selection is exclusive; a newly staged
    /// slot replaces any previous one.
    pub async fn select_slot_at(
        &self,
        date: NaiveDate,
        hour: u8,
        now: DateTime<Utc>,
    ) -> Result<PendingReservation, SelectError> {
        let mut state = self.state.write().await;
        let cell = state.grid.classify(date, hour, now, None);
        if cell.expired {
            return Err(SelectError::Expired);
        }
        match cell.availability {
            Availability::Occupied => Err(SelectError::Occupied),
            Availability::Undefined => Err(SelectError::Undefined),
            Availability::Available => {
                let mut pending = PendingReservation::new(
                    self.court_id,
                    SlotKey::new(date, hour),
                    self.court_price,
                );
                pending.payment_percentage = state.payment_percentage;
                state.pending = Some(pending.clone());
                Ok(pending)
            }
        }
    }

    /// [`select_slot_at`](Self::select_slot_at) against the wall clock.
    pub async fn select_slot(
        &self,
        date: NaiveDate,
        hour: u8,
    ) -> Result<PendingReservation, SelectError> {
        self.select_slot_at(date, hour, Utc::now()).await
    }

    /// Choose how much is paid up front. Applies to the staged reservation
    /// too, if one exists.
    pub async fn set_payment_percentage(&self, percentage: PaymentPercentage) {
        let mut state = self.state.write().await;
        state.payment_percentage = percentage;
        if let Some(pending) = state.pending.as_mut() {
            pending.payment_percentage = percentage;
        }
    }

    /// Send the staged reservation to the booking service. Exactly one
    /// request per confirm; overlapping calls are ignored while the first is
    /// in flight. Every terminal outcome clears the pending reservation and
    /// resets the payment percentage.
    pub async fn confirm(&self) -> ConfirmOutcome {
        if self.confirm_in_flight.swap(true, Ordering::SeqCst) {
            return ConfirmOutcome::InFlight;
        }

        let pending = self.state.read().await.pending.clone();
        let Some(pending) = pending else {
            self.confirm_in_flight.store(false, Ordering::SeqCst);
            return ConfirmOutcome::NothingPending;
        };

        let payload = NewBooking {
            court: pending.court_id,
            start_time: pending.start_time,
            end_time: pending.end_time,
            payment_percentage: pending.payment_percentage.as_u8(),
        };

        let outcome = match self.booking.create_booking(&payload).await {
            Ok(booking) => {
                info!(court_id = self.court_id, booking_id = booking.id, "reservation confirmed");
                {
                    let mut state = self.state.write().await;
                    state.pending = None;
                    state.payment_percentage = PaymentPercentage::default();
                    state.last_confirmed = Some(booking.clone());
                }
                // Server truth, not an optimistic patch: the confirmed cell
                // shows occupied only after the refetch says so.
                if let Err(e) = self.refresh_grid().await {
                    warn!(court_id = self.court_id, error = %e, "grid refresh after confirm failed");
                }
                ConfirmOutcome::Confirmed(booking)
            }
            Err(e) => {
                self.clear_pending().await;
                match e {
                    ClientError::AuthRequired => ConfirmOutcome::AuthRequired,
                    ClientError::Rejected(message) => ConfirmOutcome::Rejected(message),
                    other => ConfirmOutcome::Failed(other),
                }
            }
        };

        self.confirm_in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    /// Abandon the staged reservation.
    pub async fn cancel(&self) {
        self.clear_pending().await;
    }

    pub async fn previous_week(&self) -> ClientResult<()> {
        self.shift_week(-7).await
    }

    pub async fn next_week(&self) -> ClientResult<()> {
        self.shift_week(7).await
    }

    /// Push handler: any booking mutation, by any actor, refetches the week.
    pub async fn handle_push(&self, event: &PushEvent) -> ClientResult<()> {
        if event.is_booking_mutation() {
            self.refresh_grid().await?;
        }
        Ok(())
    }

    async fn clear_pending(&self) {
        let mut state = self.state.write().await;
        state.pending = None;
        state.payment_percentage = PaymentPercentage::default();
    }

    async fn shift_week(&self, days: i64) -> ClientResult<()> {
        {
            let mut state = self.state.write().await;
            let shifted = if days < 0 {
                state.week_start - Days::new(days.unsigned_abs())
            } else {
                state.week_start + Days::new(days as u64)
            };
            state.week_start = shifted;
            state.grid = AvailabilityGrid::empty(shifted);
        }
        self.refresh_grid().await
    }
}
