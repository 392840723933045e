//! Echo tracks and per-track relay loops
//!
//! A session owns one outbound audio track and one outbound video track,
//! created before negotiation so they appear in the answer. Each inbound
//! track the engine announces is paired with the outbound track of the same
//! media kind and relayed by [`relay::spawn_relay`].

pub mod relay;

pub use relay::{
    rewrite_routing, spawn_keyframe_requester, spawn_relay, spawn_rtcp_drain, RelayBinding,
    KEYFRAME_REQUEST_INTERVAL,
};

use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

/// Stream identifier the echo tracks are published under
pub const ECHO_STREAM_ID: &str = "echo-rtc";

/// The outbound audio/video pair registered on every session
#[derive(Clone)]
pub struct EchoTrackPair {
    pub audio: Arc<TrackLocalStaticRTP>,
    pub video: Arc<TrackLocalStaticRTP>,
}

impl EchoTrackPair {
    /// Create the pair; tracks are bound by the engine during negotiation
    pub fn new() -> Self {
        let audio = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            ECHO_STREAM_ID.to_owned(),
        ));
        let video = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            ECHO_STREAM_ID.to_owned(),
        ));
        Self { audio, video }
    }

    /// Outbound track matching an inbound track's media kind.
    ///
    /// Anything that is not audio relays onto the video track, mirroring the
    /// mime-prefix match the echo contract expects.
    pub fn for_kind(&self, kind: RTPCodecType) -> Arc<TrackLocalStaticRTP> {
        match kind {
            RTPCodecType::Audio => Arc::clone(&self.audio),
            _ => Arc::clone(&self.video),
        }
    }
}

impl Default for EchoTrackPair {
    fn default() -> Self {
        Self::new()
    }
}
