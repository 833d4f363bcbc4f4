//! Core logic for bridging outbound phone calls to a conversational voice agent.
//!
//! The crate is transport-agnostic: wire types for both WebSocket peers, the
//! per-call [`session::CallSession`] state machine, the call-control document,
//! and the REST clients the service calls out to. The HTTP and WebSocket runtime
//! lives in the `callbridge-api` service.

pub mod call;
pub mod convai;
pub mod error;
pub mod media_stream;
pub mod session;
pub mod signed_url;
pub mod telephony;
pub mod twiml;
