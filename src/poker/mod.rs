//! The poker state machine: table lifecycle, betting intervals, side pots,
//! and settlement. [`engine`] is the component the dispatcher calls into;
//! the other submodules are its building blocks.

pub mod betting;
pub mod engine;
pub mod errors;
pub mod pots;
pub mod seating;
pub mod types;

pub use errors::PokerError;
pub use types::{Hand, HandPhase, PlayerId, Pot, Seat, Street, Table, TableParams};
