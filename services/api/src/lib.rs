//! Call Bridge API Library Crate
//!
//! This library contains the web service that places outbound calls and relays
//! their audio to a conversational voice agent: configuration, application state,
//! REST handlers, the media-stream WebSocket and routing. The `api` binary is a
//! thin wrapper around this library.

pub mod config;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
