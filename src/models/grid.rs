//! Weekly availability grid: tri-state server cells plus pure, time-aware
//! client classification.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use std::collections::BTreeMap;

use crate::models::slot::SlotKey;

/// First bookable start hour of the day.
pub const OPENING_HOUR: u8 = 6;
/// Last bookable start hour of the day.
pub const CLOSING_HOUR: u8 = 23;

/// Raw snapshot as fetched from the booking service:
/// ISO date -> hour-of-day -> `true` (available) / `false` (occupied).
/// An absent hour is undefined: the server published no data for it.
pub type AvailabilitySnapshot = BTreeMap<NaiveDate, BTreeMap<u8, bool>>;

/// Tri-state server truth for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Occupied,
    Undefined,
}

/// Full client-side view of one cell: server truth plus the two overlays the
/// snapshot does not carry (wall-clock expiry, local selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellState {
    pub availability: Availability,
    pub expired: bool,
    pub selected: bool,
}

impl CellState {
    /// Only an available, not-yet-started cell may be selected.
    pub fn is_selectable(&self) -> bool {
        self.availability == Availability::Available && !self.expired
    }
}

/// Derived counters over one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridStats {
    pub total_slots: usize,
    pub available_slots: usize,
    pub occupied_slots: usize,
}

impl GridStats {
    pub fn availability_percentage(&self) -> u32 {
        if self.total_slots == 0 {
            return 0;
        }
        ((self.available_slots as f64 / self.total_slots as f64) * 100.0).round() as u32
    }
}

/// One week of availability for one court. Rebuilt wholesale from every
/// fetch; never patched in place.
#[derive(Debug, Clone)]
pub struct AvailabilityGrid {
    week_start: NaiveDate,
    cells: AvailabilitySnapshot,
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    let back = date.weekday().num_days_from_monday();
    date - Days::new(u64::from(back))
}

impl AvailabilityGrid {
    /// Grid with no data, used before the first fetch resolves.
    pub fn empty(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            cells: AvailabilitySnapshot::new(),
        }
    }

    pub fn from_snapshot(week_start: NaiveDate, cells: AvailabilitySnapshot) -> Self {
        Self { week_start, cells }
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    /// Sunday of the displayed week.
    pub fn week_end(&self) -> NaiveDate {
        self.week_start + Days::new(6)
    }

    /// The seven displayed days, Monday first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..7).map(move |d| self.week_start + Days::new(d))
    }

    /// Server truth for one cell.
    pub fn availability(&self, date: NaiveDate, hour: u8) -> Availability {
        match self.cells.get(&date).and_then(|day| day.get(&hour)) {
            Some(true) => Availability::Available,
            Some(false) => Availability::Occupied,
            None => Availability::Undefined,
        }
    }

    /// Classify one cell. Pure: time enters only through `now`, selection
    /// only through `selected`.
    pub fn classify(
        &self,
        date: NaiveDate,
        hour: u8,
        now: DateTime<Utc>,
        selected: Option<SlotKey>,
    ) -> CellState {
        let slot = SlotKey::new(date, hour);
        CellState {
            availability: self.availability(date, hour),
            expired: slot.start_time() <= now,
            selected: selected == Some(slot),
        }
    }

    /// Counters across every defined cell in the snapshot.
    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats::default();
        for day in self.cells.values() {
            for available in day.values() {
                stats.total_slots += 1;
                if *available {
                    stats.available_slots += 1;
                } else {
                    stats.occupied_slots += 1;
                }
            }
        }
        stats
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
