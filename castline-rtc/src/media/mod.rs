mod media_source;
mod remote_track;

pub use media_source::*;
pub use remote_track::*;
