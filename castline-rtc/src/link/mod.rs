mod loss_reason;
mod peer_link;

pub use loss_reason::LossReason;
pub(crate) use peer_link::{PeerLink, spawn_timer};
pub use peer_link::LinkSnapshot;
