//! Data models for bookings, matches, chat, push events, and the grid.

pub mod booking;
pub mod chat;
pub mod event;
pub mod grid;
pub mod open_match;
pub mod slot;

pub use booking::*;
pub use chat::*;
pub use event::*;
pub use grid::*;
pub use open_match::*;
pub use slot::*;
