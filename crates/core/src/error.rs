//! Error types shared by the call-origination and relay logic.

/// Failures while placing an outbound call.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CallError {
    /// One or more required request fields were absent or empty.
    #[error("Missing required parameters: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },
    /// The host the callback URL would point at is not usable in a URL.
    #[error("Invalid callback host {0}")]
    InvalidHost(String),
    /// The telephony platform rejected the call. Carries the platform's message.
    #[error("{0}")]
    Telephony(String),
}

/// Failures while obtaining a signed conversation URL from the AI provider.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Failed to get signed URL: {0}")]
    Unavailable(String),
    #[error("Unexpected signed URL response: {0}")]
    Protocol(String),
}

/// A frame on one of the relay's WebSockets that could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
}
