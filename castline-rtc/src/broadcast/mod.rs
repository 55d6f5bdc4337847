mod broadcast_actor;
mod broadcast_command;
mod broadcast_event;
mod broadcaster;
mod retired_peers;

pub use broadcast_event::BroadcastEvent;
pub use broadcaster::Broadcaster;
