//! Peer connection factory
//!
//! Thin wrapper over the `webrtc` crate's API object construction: media
//! engine, interceptor registry (NACK, RTCP reports), and ICE configuration.
//! The server registers the full default codec set so it can echo whatever a
//! client sends; the client registers VP8 only, matching the media section it
//! declares in its offer.

use crate::config::IceConfig;
use crate::{Error, Result};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};

/// RTP payload type the client assigns to VP8
const VP8_PAYLOAD_TYPE: u8 = 96;

/// Create a peer connection that accepts the default codec set (server side)
pub async fn server_peer_connection(ice: &IceConfig) -> Result<Arc<RTCPeerConnection>> {
    let mut media = MediaEngine::default();
    media
        .register_default_codecs()
        .map_err(|e| Error::Negotiation(format!("failed to register codecs: {e}")))?;

    build(media, ice).await
}

/// Create a peer connection that offers VP8 video only (client side)
pub async fn client_peer_connection(ice: &IceConfig) -> Result<Arc<RTCPeerConnection>> {
    let mut media = MediaEngine::default();
    media
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                payload_type: VP8_PAYLOAD_TYPE,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| Error::Negotiation(format!("failed to register VP8: {e}")))?;

    build(media, ice).await
}

async fn build(mut media: MediaEngine, ice: &IceConfig) -> Result<Arc<RTCPeerConnection>> {
    // Default interceptors provide NACK handling and RTCP reports; without
    // them the echoed stream degrades as soon as packets are lost.
    let registry = register_default_interceptors(Registry::new(), &mut media)
        .map_err(|e| Error::Negotiation(format!("failed to register interceptors: {e}")))?;

    let api = APIBuilder::new()
        .with_media_engine(media)
        .with_interceptor_registry(registry)
        .build();

    let config = RTCConfiguration {
        ice_servers: ice_servers(ice),
        ..Default::default()
    };

    let pc = api
        .new_peer_connection(config)
        .await
        .map_err(|e| Error::Negotiation(format!("failed to create peer connection: {e}")))?;

    Ok(Arc::new(pc))
}

fn ice_servers(ice: &IceConfig) -> Vec<RTCIceServer> {
    if ice.stun_servers.is_empty() {
        return vec![];
    }
    vec![RTCIceServer {
        urls: ice.stun_servers.clone(),
        ..Default::default()
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stun_list_yields_no_ice_servers() {
        let ice = IceConfig {
            stun_servers: vec![],
        };
        assert!(ice_servers(&ice).is_empty());
    }

    #[tokio::test]
    async fn client_engine_builds_offline() {
        let ice = IceConfig {
            stun_servers: vec![],
        };
        let pc = client_peer_connection(&ice).await.unwrap();
        pc.close().await.unwrap();
    }
}
