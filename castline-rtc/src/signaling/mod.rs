mod local_bus;
mod signal_bus;

pub use local_bus::*;
pub use signal_bus::*;
