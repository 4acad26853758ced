//! Channels to long running tasks live here

pub use ws_manager_chan::*;

mod ws_manager_chan;
