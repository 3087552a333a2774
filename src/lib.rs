//! Realtime sync client for a court booking platform.
//!
//! Owns the live push channels (bookings, matches, per-match chat), the
//! weekly availability grid, and the reservation protocol that reconciles a
//! user's slot selection with server authority. REST collaborators (booking
//! service, match service, chat history, credential refresh) are consumed
//! through traits; everything here degrades instead of crashing — bad frames
//! are dropped, lost connections retry up to a ceiling, conflicts surface as
//! typed outcomes.

pub mod auth;
pub mod channels;
pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

pub use auth::{CredentialStore, LiveChannelAuthGuard, MemoryCredentialStore, RestCredentialStore};
pub use channels::{ChannelKey, ChannelManager, ChannelRegistry, ChannelState, Subscription};
pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use services::{ChatSession, ConfirmOutcome, RefetchCoordinator, ReservationFlow};
