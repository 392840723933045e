//! Per-track relay loop and its companion tasks
//!
//! Each inbound track gets an independent relay loop for its lifetime.
//! Payload bytes pass through untouched; only the routing identifier (SSRC)
//! is rewritten, once-resolved at loop start, so the packet leaves under the
//! outbound track's identity. A relay failure is scoped to its own track and
//! never tears down the process or other sessions.

use crate::{Error, Result};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_remote::TrackRemote;

/// How often a fresh keyframe is requested from the sender
pub const KEYFRAME_REQUEST_INTERVAL: Duration = Duration::from_secs(3);

/// Routing-identifier mapping from an inbound track to its outbound twin,
/// resolved once when the relay starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayBinding {
    /// SSRC the outbound sender was assigned during negotiation
    pub ssrc: u32,
}

impl RelayBinding {
    /// Resolve the binding from the outbound sender's negotiated encoding
    pub async fn resolve(sender: &RTCRtpSender) -> Self {
        let params = sender.get_parameters().await;
        let ssrc = params.encodings.first().map(|e| e.ssrc).unwrap_or_default();
        Self { ssrc }
    }
}

/// Rewrite a packet's routing metadata for the outbound track.
///
/// The payload is deliberately left untouched; the echo contract forwards
/// media bytes verbatim.
pub fn rewrite_routing(packet: &mut Packet, binding: &RelayBinding) {
    packet.header.ssrc = binding.ssrc;
}

/// Spawn the relay loop for one inbound track.
///
/// The loop runs until the inbound stream ends. A read error is how the
/// engine signals end-of-stream, so it exits quietly; a write error closes
/// only this relay.
pub fn spawn_relay(
    remote: Arc<TrackRemote>,
    local: Arc<TrackLocalStaticRTP>,
    binding: RelayBinding,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let in_ssrc = remote.ssrc();
        debug!(in_ssrc, out_ssrc = binding.ssrc, "relay loop started");

        if let Err(e) = relay_loop(&remote, &local, &binding).await {
            warn!(in_ssrc, out_ssrc = binding.ssrc, "relay closed: {e}");
        }

        debug!(in_ssrc, "relay loop finished");
    })
}

async fn relay_loop(
    remote: &TrackRemote,
    local: &TrackLocalStaticRTP,
    binding: &RelayBinding,
) -> Result<()> {
    loop {
        let (mut packet, _attributes) = match remote.read_rtp().await {
            Ok(read) => read,
            Err(e) => {
                debug!(in_ssrc = remote.ssrc(), "inbound track ended: {e}");
                return Ok(());
            }
        };

        rewrite_routing(&mut packet, binding);

        local
            .write_rtp(&packet)
            .await
            .map_err(|e| Error::Relay(format!("outbound write failed: {e}")))?;
    }
}

/// Spawn the periodic keyframe requester for an inbound video track.
///
/// Sends a PLI referencing the inbound SSRC every [`KEYFRAME_REQUEST_INTERVAL`]
/// as a best-effort guard against dropped keyframes. Send failures are logged
/// and the ticker keeps going; the task exits once the connection is gone.
pub fn spawn_keyframe_requester(pc: Weak<RTCPeerConnection>, media_ssrc: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = keyframe_request_ticker();
        loop {
            ticker.tick().await;
            let Some(pc) = pc.upgrade() else {
                break;
            };
            if let Err(e) = pc
                .write_rtcp(&[Box::new(PictureLossIndication {
                    sender_ssrc: 0,
                    media_ssrc,
                })])
                .await
            {
                debug!(media_ssrc, "keyframe request failed: {e}");
            }
        }
        debug!(media_ssrc, "keyframe requester stopped");
    })
}

/// Ticker for the keyframe requester. The first request goes out one full
/// interval after relay start, not immediately.
fn keyframe_request_ticker() -> tokio::time::Interval {
    tokio::time::interval_at(
        tokio::time::Instant::now() + KEYFRAME_REQUEST_INTERVAL,
        KEYFRAME_REQUEST_INTERVAL,
    )
}

/// Spawn the RTCP drain loop for an outbound sender.
///
/// Reading (and discarding) sender feedback is what keeps the interceptor
/// chain's NACK/report accounting progressing. Exits silently when the
/// underlying channel closes.
pub fn spawn_rtcp_drain(sender: Arc<RTCRtpSender>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; 1500];
        while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use webrtc::rtp::header::Header;

    fn packet(seq: u16, ssrc: u32, payload: Vec<u8>) -> Packet {
        Packet {
            header: Header {
                sequence_number: seq,
                ssrc,
                ..Default::default()
            },
            payload: Bytes::from(payload),
        }
    }

    #[test]
    fn rewrite_preserves_payload_and_order() {
        let binding = RelayBinding { ssrc: 0xDEAD_BEEF };
        let inbound: Vec<Packet> = (0..16u16)
            .map(|i| packet(i, 0x1111_1111, vec![i as u8; 64]))
            .collect();

        let mut relayed = Vec::new();
        for mut p in inbound.clone() {
            rewrite_routing(&mut p, &binding);
            relayed.push(p);
        }

        assert_eq!(relayed.len(), inbound.len());
        for (i, (before, after)) in inbound.iter().zip(&relayed).enumerate() {
            assert_eq!(after.header.ssrc, 0xDEAD_BEEF);
            assert_eq!(after.payload, before.payload, "payload changed at {i}");
            assert_eq!(after.header.sequence_number, i as u16);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keyframe_requests_wait_out_the_first_interval() {
        let started = tokio::time::Instant::now();
        let mut ticker = keyframe_request_ticker();

        ticker.tick().await;
        assert_eq!(started.elapsed(), KEYFRAME_REQUEST_INTERVAL);

        ticker.tick().await;
        assert_eq!(started.elapsed(), KEYFRAME_REQUEST_INTERVAL * 2);
    }

    #[test]
    fn rewrite_touches_nothing_but_the_ssrc() {
        let binding = RelayBinding { ssrc: 42 };
        let mut p = packet(7, 1, vec![1, 2, 3]);
        p.header.timestamp = 90_000;
        p.header.marker = true;

        rewrite_routing(&mut p, &binding);

        assert_eq!(p.header.ssrc, 42);
        assert_eq!(p.header.timestamp, 90_000);
        assert!(p.header.marker);
        assert_eq!(p.header.sequence_number, 7);
        assert_eq!(p.payload.as_ref(), &[1, 2, 3]);
    }
}
