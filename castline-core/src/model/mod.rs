mod ice;
mod peer;
mod signaling;
mod stream;

pub use ice::{
    DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, DEFAULT_STUN_ADDR_3, DEFAULT_STUN_ADDR_4,
    IceCandidate, IceServerConfig,
};
pub use peer::PeerId;
pub use signaling::{SignalMessage, SignalPayload};
pub use stream::StreamId;
