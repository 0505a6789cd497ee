//! Mention resolution and cache engine.
//!
//! This crate is framework-agnostic. The chat client, its user/member store and
//! the remote profile service live behind ports (traits) implemented by the host
//! and by adapter crates such as `mcf-http`.

pub mod batch;
pub mod cache;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod logging;
pub mod model;
pub mod ports;
pub mod resolver;
pub mod sessions;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{EnginePorts, MentionEngine};
pub use errors::{Error, Result};
