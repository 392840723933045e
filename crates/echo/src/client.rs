//! Client side of the echo exchange
//!
//! A client drives exactly one connection attempt: build an offer, gather
//! candidates, POST the offer, apply the answer, then watch the connection
//! state until it settles or the deadline passes. The whole attempt shares
//! one deadline, so slow signaling eats into the time left for connectivity
//! checks.
//!
//! Engine state callbacks are forwarded into a channel and consumed by the
//! waiting task; the decision logic never runs inside an engine callback.

use crate::config::{ClientConfig, IceConfig};
use crate::media::ECHO_STREAM_ID;
use crate::{engine, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

/// Where a connection attempt currently is, for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    /// Building the local offer
    Negotiating,
    /// Waiting for ICE candidate gathering to finish
    Gathering,
    /// Offer sent, waiting for the server's answer
    AwaitingAnswer,
    /// Answer applied, watching connectivity
    Connecting,
}

impl std::fmt::Display for ConnectPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectPhase::Negotiating => "negotiating",
            ConnectPhase::Gathering => "gathering",
            ConnectPhase::AwaitingAnswer => "awaiting-answer",
            ConnectPhase::Connecting => "connecting",
        };
        f.write_str(s)
    }
}

/// How a connection attempt settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The peer connection reached `Connected` before the deadline
    Connected,
    /// The connection settled in a terminal non-connected state
    Failed(RTCPeerConnectionState),
    /// The deadline passed before any terminal state was observed
    TimedOut,
}

impl ConnectOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConnectOutcome::Connected)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for ConnectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectOutcome::Connected => f.write_str("connected"),
            ConnectOutcome::Failed(state) => write!(f, "failed ({state})"),
            ConnectOutcome::TimedOut => f.write_str("timed out"),
        }
    }
}

/// One-shot echo client
pub struct EchoClient {
    client_config: ClientConfig,
    ice: IceConfig,
    http: reqwest::Client,
}

impl EchoClient {
    pub fn new(client_config: ClientConfig, ice: IceConfig) -> Self {
        Self {
            client_config,
            ice,
            http: reqwest::Client::new(),
        }
    }

    /// Run one connection attempt end to end.
    ///
    /// Returns `Ok` with the settled outcome when the attempt ran to a
    /// decision, `Err` when it could not even get that far (offer creation
    /// or signaling transport failed).
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        let deadline =
            Instant::now() + Duration::from_secs(self.client_config.connect_timeout_secs);

        info!(phase = %ConnectPhase::Negotiating, "starting connection attempt");
        let pc = engine::client_peer_connection(&self.ice).await?;

        // A local video track gives the offer a sendrecv media section for
        // the server to echo onto.
        let output_track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            ECHO_STREAM_ID.to_owned(),
        ));
        let sender = pc
            .add_track(Arc::clone(&output_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to add video track: {e}")))?;
        crate::media::spawn_rtcp_drain(sender);

        // State updates flow through this channel to the waiter below.
        let (state_tx, state_rx) = mpsc::channel::<RTCPeerConnectionState>(8);
        pc.on_peer_connection_state_change(Box::new(move |state| {
            let tx = state_tx.clone();
            Box::pin(async move {
                let _ = tx.send(state).await;
            })
        }));

        let offer = pc
            .create_offer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to create offer: {e}")))?;

        // Arm the gathering promise before the local description starts the
        // gatherers, then block until every candidate is in the offer.
        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(offer)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to apply local offer: {e}")))?;

        info!(phase = %ConnectPhase::Gathering, "waiting for candidate gathering");
        let _ = gather_complete.recv().await;

        let offer_with_candidates = pc.local_description().await.ok_or_else(|| {
            Error::Negotiation("local description missing after gathering".to_string())
        })?;

        info!(
            phase = %ConnectPhase::AwaitingAnswer,
            url = %self.client_config.server_url,
            "posting offer"
        );
        let answer = self.exchange_offer(&offer_with_candidates, deadline).await;
        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                let _ = pc.close().await;
                return Err(e);
            }
        };

        if let Err(e) = pc.set_remote_description(answer).await {
            let _ = pc.close().await;
            return Err(Error::Negotiation(format!(
                "failed to apply remote answer: {e}"
            )));
        }

        info!(phase = %ConnectPhase::Connecting, "answer applied, watching connection state");
        let outcome = await_outcome(state_rx, deadline).await;
        info!(%outcome, "connection attempt settled");

        if let Err(e) = pc.close().await {
            debug!("error closing peer connection: {e}");
        }
        Ok(outcome)
    }

    /// POST the gathered offer and decode the answer.
    ///
    /// The request shares the attempt's deadline: whatever time negotiation
    /// and gathering already spent is gone.
    async fn exchange_offer(
        &self,
        offer: &RTCSessionDescription,
        deadline: Instant,
    ) -> Result<RTCSessionDescription> {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or_else(|| Error::Signaling("deadline passed before the offer was sent".into()))?;

        let response = self
            .http
            .post(&self.client_config.server_url)
            .timeout(remaining)
            .json(offer)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "offer rejected by server");
            return Err(Error::Signaling(format!(
                "server rejected offer with {status}: {body}"
            )));
        }

        let answer: RTCSessionDescription = response.json().await?;
        if answer.sdp_type != webrtc::peer_connection::sdp::sdp_type::RTCSdpType::Answer {
            return Err(Error::Signaling(format!(
                "expected an answer, got {}",
                answer.sdp_type
            )));
        }
        Ok(answer)
    }
}

/// Watch connection states until one settles the attempt or the deadline
/// passes.
///
/// `Connected` wins immediately; `Failed`, `Disconnected` and `Closed` are
/// terminal failures; everything else is transitional and ignored. A closed
/// channel means the connection was torn down without reaching a terminal
/// state, which also counts as a failure.
pub async fn await_outcome(
    mut states: mpsc::Receiver<RTCPeerConnectionState>,
    deadline: Instant,
) -> ConnectOutcome {
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                return ConnectOutcome::TimedOut;
            }
            state = states.recv() => {
                match state {
                    Some(RTCPeerConnectionState::Connected) => {
                        return ConnectOutcome::Connected;
                    }
                    Some(
                        state @ (RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed),
                    ) => {
                        return ConnectOutcome::Failed(state);
                    }
                    Some(state) => {
                        debug!(%state, "transitional connection state");
                    }
                    None => {
                        return ConnectOutcome::Failed(RTCPeerConnectionState::Closed);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadline_in(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_wins_when_nothing_settles() {
        let (tx, rx) = mpsc::channel(8);

        // Only transitional states arrive; the attempt must still time out.
        tokio::spawn(async move {
            let _ = tx.send(RTCPeerConnectionState::New).await;
            let _ = tx.send(RTCPeerConnectionState::Connecting).await;
            // Keep the sender alive past the deadline.
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let started = Instant::now();
        let outcome = await_outcome(rx, deadline_in(10)).await;
        assert_eq!(outcome, ConnectOutcome::TimedOut);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn early_success_settles_immediately() {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let _ = tx.send(RTCPeerConnectionState::Connecting).await;
            let _ = tx.send(RTCPeerConnectionState::Connected).await;
        });

        let started = Instant::now();
        let outcome = await_outcome(rx, deadline_in(10)).await;
        assert_eq!(outcome, ConnectOutcome::Connected);
        // Nowhere near the deadline.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn early_failure_beats_the_deadline() {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let _ = tx.send(RTCPeerConnectionState::Connecting).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
            let _ = tx.send(RTCPeerConnectionState::Failed).await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let started = Instant::now();
        let outcome = await_outcome(rx, deadline_in(10)).await;
        assert_eq!(
            outcome,
            ConnectOutcome::Failed(RTCPeerConnectionState::Failed)
        );
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_channel_is_a_failure_not_a_hang() {
        let (tx, rx) = mpsc::channel::<RTCPeerConnectionState>(8);
        drop(tx);

        let outcome = await_outcome(rx, deadline_in(10)).await;
        assert_eq!(
            outcome,
            ConnectOutcome::Failed(RTCPeerConnectionState::Closed)
        );
    }

    #[test]
    fn exit_codes_follow_the_outcome() {
        assert_eq!(ConnectOutcome::Connected.exit_code(), 0);
        assert_eq!(ConnectOutcome::TimedOut.exit_code(), 1);
        assert_eq!(
            ConnectOutcome::Failed(RTCPeerConnectionState::Disconnected).exit_code(),
            1
        );
    }
}
