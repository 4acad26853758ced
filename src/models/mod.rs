//! All the database models live here.

pub use account::*;
pub use chat::*;
pub use connection::*;
pub use group::*;
pub use ride::*;

mod account;
mod chat;
mod connection;
mod group;
mod ride;
