//! WebRTC echo session core
//!
//! One offer/answer exchange per session, non-trickle ICE: the client builds
//! an offer, waits for candidate gathering to finish, and POSTs it to the
//! server's `/offer` endpoint. The server answers with a pair of echo tracks
//! and relays every inbound RTP packet back out on the matching local track.
//!
//! The crate is split along the session lifecycle:
//! - [`engine`] builds `RTCPeerConnection`s (codecs, interceptors, ICE config)
//! - [`signaling`] answers offers and exposes the axum HTTP surface
//! - [`media`] owns the echo tracks and the per-track relay loops
//! - [`session`] tracks live sessions and drives teardown on failure
//! - [`client`] drives a single connection attempt to a boolean outcome

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod session;
pub mod signaling;

pub use client::{ConnectOutcome, ConnectPhase, EchoClient};
pub use config::{
    ClientConfig, EchoConfig, IceConfig, ServerConfig, DEFAULT_ECHO_SERVER_URL,
    DEFAULT_STUN_SERVER,
};
pub use error::{Error, Result};
pub use session::{EchoSession, SessionId, SessionRegistry};
pub use signaling::{build_router, AppState};
