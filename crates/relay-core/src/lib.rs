//! Core of the ChatGPT relay bot.
//!
//! This crate is framework-agnostic. The chat transports, the conversation backend and the
//! browser used for interactive login live behind ports (traits) implemented in adapter crates.

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod router;
pub mod source;

pub use errors::{Error, Result};
