//! sigil-server: HTTP/WebSocket shell around the sigil effect engine.
//!
//! The binary wires a storage backend, the event bus, and the connection
//! registry into an axum router; everything interesting about effect
//! semantics lives in `sigil-core`, this crate only does transport.

pub mod cli;
pub mod config;
pub mod registry;
pub mod routes;
pub mod wire;
pub mod ws;
