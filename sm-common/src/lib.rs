//! # StreetMatch Common Library
//!
//! Shared code for the StreetMatch game server and its tooling:
//! - Error and Result types
//! - TOML bootstrap configuration and config file resolution
//! - Session event types (GameEvent enum) and the event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
