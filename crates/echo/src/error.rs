//! Error types for the echo service

/// Result type alias using the echo service [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating or relaying a session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed or undecodable session description payload.
    ///
    /// Raised before any session is created; the HTTP layer maps it to a
    /// client error response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The media engine rejected offer/answer creation or description
    /// application. Any partially created session is released by the caller.
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Relay I/O failure, scoped to a single track's loop
    #[error("Relay error: {0}")]
    Relay(String),

    /// Client-side signaling exchange failure (offer POST / answer decode)
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True for request-scoped faults the server reports to the caller
    /// without touching other sessions.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}
