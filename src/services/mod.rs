//! Client-side flows: the reservation protocol, push-driven refetch glue,
//! and chat sessions.

pub mod chat;
pub mod refetch;
pub mod reservation;

pub use chat::{ChatEvent, ChatSession};
pub use refetch::RefetchCoordinator;
pub use reservation::{ConfirmOutcome, ReservationFlow, SelectError};
