use crate::config::ConfigError;
use crate::signaling::BusError;
use castline_core::StreamId;

#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("stream `{0}` is already being broadcast by this handle")]
    AlreadyBroadcasting(StreamId),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("peer transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
}
