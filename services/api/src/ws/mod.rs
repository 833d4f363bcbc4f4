//! WebSocket Media Stream Relay
//!
//! This module bridges a Twilio media stream to an ElevenLabs Conversational AI
//! agent. It is structured into submodules:
//!
//! - `session`: Drives the Twilio socket and the per-call state machine.
//! - `provider`: Owns the outbound agent socket in its own task.

pub mod provider;
pub mod session;

pub use session::media_stream_handler;
