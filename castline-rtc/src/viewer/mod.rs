mod viewer;
mod viewer_actor;
mod viewer_command;
mod viewer_event;

pub use viewer::Viewer;
pub use viewer_event::{ViewerEvent, ViewerStatus};
