//! HTTP surface of gigpal: auth, event catalog and the matchmaking routes.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
