//! Wire model and per-link state for castline broadcasts.
//!
//! Everything in this crate is runtime-agnostic: the signaling message
//! types exchanged over the bus, the connection state machine shared by
//! the broadcaster and viewer roles, and the candidate buffer that keeps
//! network candidates away from a link until its remote description is
//! known.

mod error;
pub mod link;
pub mod model;

pub use error::{CoreError, TransitionError};
pub use link::{CandidateBuffer, LinkInput, LinkState, Role};
pub use model::*;
