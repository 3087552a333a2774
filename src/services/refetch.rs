//! Push-driven refetch glue.
//!
//! Push handlers never apply event payloads to local state; they invalidate
//! and reload from the REST collaborator. This coordinator makes that policy
//! explicit: bursts of events coalesce into at most one in-flight refetch
//! plus one follow-up run, and the whole loop dies with its subscription.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::channels::Subscription;
use crate::models::event::PushEvent;

/// Background loop tying a channel subscription to a refetch action.
pub struct RefetchCoordinator {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RefetchCoordinator {
    /// Spawn the loop. `filter` decides which events invalidate the resource;
    /// `refetch` reloads it. Events arriving while a refetch is in flight
    /// queue up and fold into a single follow-up run — results are
    /// last-write-wins, the server stays authoritative on the next read.
    /// `periodic` adds a fixed-interval reload as a backstop for missed
    /// pushes.
    pub fn spawn<Fi, Fr, Fut>(
        mut subscription: Subscription,
        filter: Fi,
        mut refetch: Fr,
        periodic: Option<Duration>,
    ) -> Self
    where
        Fi: Fn(&PushEvent) -> bool + Send + 'static,
        Fr: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = subscription.cancellation_token();
        let loop_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = periodic.map(|period| interval_at(Instant::now() + period, period));

            loop {
                let triggered = tokio::select! {
                    _ = loop_cancel.cancelled() => return,
                    event = subscription.recv() => match event {
                        Some(event) => filter(&event),
                        None => return,
                    },
                    _ = tick(&mut ticker) => true,
                };
                if !triggered {
                    continue;
                }

                // Coalesce: whatever else queued up belongs to this run.
                let mut folded = 0u32;
                while subscription.try_recv().is_some() {
                    folded += 1;
                }
                if folded > 0 {
                    debug!(folded, "coalesced queued push events");
                }

                // Cancelling aborts the refetch at its await point, so a
                // disposed subscription never mutates state afterwards.
                tokio::select! {
                    _ = loop_cancel.cancelled() => return,
                    _ = refetch() => {}
                }
            }
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Token shared with the underlying subscription's lifetime.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop. Once this returns, no refetch runs or completes.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RefetchCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelKey, ChannelManager};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn manager() -> ChannelManager {
        ChannelManager::new(
            ChannelKey::Bookings,
            "ws://localhost:9",
            Duration::from_millis(10),
            5,
        )
    }

    const BOOKING_EVENT: &str = r#"{"type": "booking_cancelled", "booking_id": 1}"#;

    fn counting_coordinator(
        manager: &ChannelManager,
        delay: Duration,
    ) -> (RefetchCoordinator, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let coordinator = RefetchCoordinator::spawn(
            manager.subscribe(),
            PushEvent::is_booking_mutation,
            move || {
                let counter = counter.clone();
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
            None,
        );
        (coordinator, count)
    }

    #[tokio::test]
    async fn one_event_one_refetch() {
        let manager = manager();
        let (coordinator, count) = counting_coordinator(&manager, Duration::ZERO);

        manager.dispatch_frame(BOOKING_EVENT);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn bursts_coalesce() {
        let manager = manager();
        let (coordinator, count) = counting_coordinator(&manager, Duration::from_millis(50));

        for _ in 0..5 {
            manager.dispatch_frame(BOOKING_EVENT);
        }
        tokio::time::sleep(Duration::from_millis(250)).await;

        // One in-flight run plus at most one follow-up for the queued burst.
        let runs = count.load(Ordering::SeqCst);
        assert!((1..=2).contains(&runs), "expected 1..=2 runs, got {}", runs);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn filtered_events_do_not_refetch() {
        let manager = manager();
        let (coordinator, count) = counting_coordinator(&manager, Duration::ZERO);

        manager.dispatch_frame(r#"{"type": "typing", "username": "ana", "is_typing": true}"#);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn stop_prevents_further_refetches() {
        let manager = manager();
        let (coordinator, count) = counting_coordinator(&manager, Duration::ZERO);

        coordinator.stop().await;
        manager.dispatch_frame(BOOKING_EVENT);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn periodic_backstop_fires_without_events() {
        let manager = manager();
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let coordinator = RefetchCoordinator::spawn(
            manager.subscribe(),
            PushEvent::is_booking_mutation,
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
            Some(Duration::from_millis(30)),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(count.load(Ordering::SeqCst) >= 2);

        coordinator.stop().await;
    }
}
