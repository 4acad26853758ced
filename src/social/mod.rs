//! The friend graph of ridealong.
//!
//! Connections between accounts are stored as a single row per unordered [Pair]. The
//! [state] module decides how actions change them, [policy] derives what accounts may do
//! regarding each other and [SocialGraph] exposes the operations to the handlers.

pub use db::DbStore;
pub use error::*;
pub use graph::*;
pub use page::Page;
pub use pair::Pair;
pub use policy::*;
pub use state::*;
pub use store::*;

mod db;
mod error;
mod graph;
#[cfg(test)]
mod memory;
mod page;
mod pair;
pub mod policy;
pub mod state;
mod store;
