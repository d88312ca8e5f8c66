//! Matchmaking core: pools, swipes, matches and chat over SQLite.
//!
//! Every operation takes the caller's id explicitly; nothing here knows about
//! tokens or sessions.

pub mod chat;
pub mod db;
pub mod error;
pub mod events;
pub mod model;
pub mod pool;
pub mod swipe;
pub mod users;

pub use error::{Conflict, Error, Result};
pub use model::*;
