//! The slot-reservation race, end to end: two clients, one slot, the server
//! as sole arbiter, and push-driven refetch as the only reconciliation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use courtsync::error::{ClientError, ClientResult};
use courtsync::models::booking::{
    Booking, BookingFilter, BookingStats, BookingStatus, CourtSummary, NewBooking,
};
use courtsync::models::event::PushEvent;
use courtsync::models::grid::{Availability, AvailabilitySnapshot};
use courtsync::repositories::BookingService;
use courtsync::services::reservation::{ConfirmOutcome, ReservationFlow, SelectError};
use courtsync::{ChannelKey, ChannelManager, RefetchCoordinator};

const COURT_ID: i64 = 3;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn now() -> DateTime<Utc> {
    "2024-06-10T09:00:00Z".parse().unwrap()
}

/// Stand-in for the booking service: first writer wins a slot, everyone else
/// is rejected, and the availability snapshot always reflects the table.
struct SharedCourtService {
    week: Vec<NaiveDate>,
    hours: Vec<u8>,
    taken: Mutex<HashMap<(NaiveDate, u8), i64>>,
    next_id: AtomicI64,
}

impl SharedCourtService {
    fn new(week_start: NaiveDate, hours: impl IntoIterator<Item = u8>) -> Self {
        Self {
            week: (0..7).map(|d| week_start + chrono::Days::new(d)).collect(),
            hours: hours.into_iter().collect(),
            taken: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn occupy(&self, day: NaiveDate, hour: u8) {
        self.taken.lock().unwrap().insert((day, hour), 0);
    }
}

#[async_trait]
impl BookingService for SharedCourtService {
    async fn list_bookings(&self, _filter: &BookingFilter) -> ClientResult<Vec<Booking>> {
        Ok(Vec::new())
    }

    async fn create_booking(&self, new: &NewBooking) -> ClientResult<Booking> {
        let slot = (new.start_time.date_naive(), new.start_time.hour() as u8);
        let mut taken = self.taken.lock().unwrap();
        if taken.contains_key(&slot) {
            return Err(ClientError::Rejected(
                "slot no longer available".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        taken.insert(slot, id);
        Ok(Booking {
            id,
            start_time: new.start_time,
            end_time: new.end_time,
            status: BookingStatus::Pending,
            court_details: Some(CourtSummary {
                id: new.court,
                name: None,
            }),
            user_details: None,
            payment: None,
            payment_percentage: Some(new.payment_percentage),
            created_at: None,
        })
    }

    async fn delete_booking(&self, _id: i64) -> ClientResult<()> {
        Ok(())
    }

    async fn weekly_availability(
        &self,
        _court_id: i64,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> ClientResult<AvailabilitySnapshot> {
        let taken = self.taken.lock().unwrap();
        let mut snapshot = AvailabilitySnapshot::new();
        for day in &self.week {
            let cells = snapshot.entry(*day).or_default();
            for hour in &self.hours {
                cells.insert(*hour, !taken.contains_key(&(*day, *hour)));
            }
        }
        Ok(snapshot)
    }

    async fn stats(&self) -> ClientResult<BookingStats> {
        Ok(BookingStats {
            total_bookings: self.taken.lock().unwrap().len() as u64,
            percentage_change: 0.0,
        })
    }
}

fn broadcast_for(booking: &Booking) -> PushEvent {
    let frame = serde_json::json!({
        "type": "booking_created",
        "booking": booking,
    });
    PushEvent::parse(&frame.to_string()).unwrap()
}

#[tokio::test]
async fn two_clients_one_slot_server_arbitrates() {
    let service = Arc::new(SharedCourtService::new(date("2024-06-10"), 14..=16));
    let client_a = ReservationFlow::new(service.clone(), COURT_ID, Some(40.0), date("2024-06-10"));
    let client_b = ReservationFlow::new(service.clone(), COURT_ID, Some(40.0), date("2024-06-10"));
    client_a.refresh_grid().await.unwrap();
    client_b.refresh_grid().await.unwrap();

    let day = date("2024-06-10");

    // B stages the slot first, then A stages the same one and confirms.
    client_b.select_slot_at(day, 14, now()).await.unwrap();
    client_a.select_slot_at(day, 14, now()).await.unwrap();

    let outcome = client_a.confirm().await;
    let booking = match outcome {
        ConfirmOutcome::Confirmed(booking) => booking,
        other => panic!("expected confirmation, got {:?}", other),
    };
    assert_eq!(
        client_a.grid().await.availability(day, 14),
        Availability::Occupied
    );

    // The server broadcast reaches both clients.
    let event = broadcast_for(&booking);
    client_a.handle_push(&event).await.unwrap();
    client_b.handle_push(&event).await.unwrap();

    // B still holds its stale pending reservation and tries anyway.
    let outcome = client_b.confirm().await;
    assert!(matches!(outcome, ConfirmOutcome::Rejected(ref m) if m.contains("no longer")));
    assert!(client_b.pending().await.is_none());

    // After the push-triggered refetch the cell is occupied for B too, and
    // cannot be re-selected.
    assert_eq!(
        client_b.grid().await.availability(day, 14),
        Availability::Occupied
    );
    assert_eq!(
        client_b.select_slot_at(day, 14, now()).await,
        Err(SelectError::Occupied)
    );
}

#[tokio::test]
async fn foreign_booking_push_makes_slot_unselectable() {
    let service = Arc::new(SharedCourtService::new(date("2024-06-10"), 14..=16));
    let flow = ReservationFlow::new(service.clone(), COURT_ID, Some(40.0), date("2024-06-10"));
    flow.refresh_grid().await.unwrap();

    let day = date("2024-06-10");
    assert!(flow
        .classify(day, 15, now())
        .await
        .is_selectable());

    // A different user's reservation lands on the server; this client never
    // touched that slot.
    service.occupy(day, 15);
    let event = PushEvent::parse(
        r#"{"type": "booking_created", "booking": {
            "id": 50,
            "user_details": {"id": 99, "username": "rival"},
            "start_time": "2024-06-10T15:00:00Z",
            "end_time": "2024-06-10T16:00:00Z",
            "status": "pending"
        }}"#,
    )
    .unwrap();
    flow.handle_push(&event).await.unwrap();

    let cell = flow.classify(day, 15, now()).await;
    assert_eq!(cell.availability, Availability::Occupied);
    assert!(!cell.is_selectable());
}

/// Full wire loop: a booking_created frame over a real WebSocket drives the
/// coordinator, which refetches the grid.
#[tokio::test]
async fn push_over_the_wire_invalidates_the_grid() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        loop {
            tokio::select! {
                frame = frames_rx.recv() => match frame {
                    Some(frame) => {
                        if ws.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                msg = ws.next() => match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                },
            }
        }
    });

    let service = Arc::new(SharedCourtService::new(date("2024-06-10"), 14..=16));
    let flow = Arc::new(ReservationFlow::new(
        service.clone(),
        COURT_ID,
        Some(40.0),
        date("2024-06-10"),
    ));
    flow.refresh_grid().await.unwrap();

    let manager = ChannelManager::new(
        ChannelKey::Bookings,
        format!("ws://{}", addr),
        Duration::from_millis(30),
        2,
    );
    let refetch_flow = flow.clone();
    let coordinator = RefetchCoordinator::spawn(
        manager.subscribe(),
        PushEvent::is_booking_mutation,
        move || {
            let flow = refetch_flow.clone();
            async move {
                let _ = flow.refresh_grid().await;
            }
        },
        None,
    );
    manager.connect(Some("tok".into()));

    // Another actor books 14:00 and the server broadcasts it.
    let day = date("2024-06-10");
    service.occupy(day, 14);
    frames_tx
        .send(
            r#"{"type": "booking_created", "booking": {
                "id": 60,
                "start_time": "2024-06-10T14:00:00Z",
                "end_time": "2024-06-10T15:00:00Z",
                "status": "pending"
            }}"#
            .to_string(),
        )
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if flow.grid().await.availability(day, 14) == Availability::Occupied {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "grid never refetched from the push event"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    coordinator.stop().await;
    manager.disconnect().await;
}
