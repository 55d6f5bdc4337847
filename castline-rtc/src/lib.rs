//! Broadcaster and viewer runtimes for castline.
//!
//! A [`Broadcaster`] fans one [`MediaSource`] out to every viewer over
//! direct peer connections; a [`Viewer`] joins a stream and exposes the
//! inbound media once it flows. Both negotiate over a [`SignalBus`] topic
//! named after the stream and never send media through it.

mod broadcast;
mod config;
mod error;
mod link;
mod media;
mod signaling;
mod transport;
mod viewer;

pub use broadcast::*;
pub use castline_core::{
    CandidateBuffer, CoreError, IceCandidate, IceServerConfig, LinkInput, LinkState, PeerId,
    Role, SignalMessage, SignalPayload, StreamId, TransitionError,
};
pub use config::*;
pub use error::*;
pub use link::{LinkSnapshot, LossReason};
pub use media::*;
pub use signaling::*;
pub use transport::*;
pub use viewer::*;
