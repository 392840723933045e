//! Session lifecycle
//!
//! One [`EchoSession`] per negotiated peer connection. Sessions are owned by
//! the [`SessionRegistry`] from registration until removal; callers hold the
//! opaque [`SessionId`] handle, never a reference into the registry's map.

pub mod registry;

pub use registry::SessionRegistry;

use crate::Result;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use webrtc::peer_connection::RTCPeerConnection;

/// Opaque handle identifying one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One negotiated peer connection and its echo tracks.
///
/// The relay loops and companion tasks hold their own handles into the
/// engine; closing the peer connection is what unwinds them (their reads
/// fail and the loops exit).
pub struct EchoSession {
    id: SessionId,
    pc: Arc<RTCPeerConnection>,
}

impl EchoSession {
    pub fn new(pc: Arc<RTCPeerConnection>) -> Self {
        Self {
            id: SessionId::new(),
            pc,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The underlying engine connection
    pub fn connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }

    /// Release the underlying peer connection
    pub async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }
}
