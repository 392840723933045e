//! Offer/answer handshake and the HTTP signaling surface
//!
//! Exactly one offer/answer exchange happens per session, non-trickle: the
//! answer is not returned until ICE gathering has completed, so it carries
//! the full candidate list and the peer never needs a follow-up message.
//!
//! Failures are scoped to the request. A payload that does not decode is
//! rejected before any session exists; a negotiation failure releases the
//! partially built session and is reported to the caller. Neither touches
//! other sessions or the process.

use crate::config::EchoConfig;
use crate::media::{self, EchoTrackPair};
use crate::session::{EchoSession, SessionRegistry};
use crate::{engine, Error, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

/// State shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live sessions
    pub registry: Arc<SessionRegistry>,
    /// Service configuration
    pub config: Arc<EchoConfig>,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>, config: Arc<EchoConfig>) -> Self {
        Self { registry, config }
    }
}

/// Build the HTTP router: signaling endpoints plus static file fallback
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        .route("/offer", post(offer_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Structured error body returned on signaling failures
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        sessions: state.registry.len().await,
    })
}

/// `POST /offer` — answer a client's session offer
async fn offer_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RTCSessionDescription>, JsonRejection>,
) -> Response {
    let Json(offer) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!("rejecting undecodable offer payload: {rejection}");
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid session description: {rejection}"),
            );
        }
    };

    match answer_offer(&state.registry, &state.config, offer).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(err) => {
            warn!("offer rejected: {err}");
            error_response(status_for(&err), err.to_string())
        }
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

fn status_for(err: &Error) -> StatusCode {
    if err.is_protocol() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Answer one offer: create a session, wire its echo relays, negotiate, and
/// register it.
///
/// The returned description is the local answer after gathering completed,
/// candidates embedded. On any failure the partially created session is
/// closed and never registered.
pub async fn answer_offer(
    registry: &Arc<SessionRegistry>,
    config: &EchoConfig,
    offer: RTCSessionDescription,
) -> Result<RTCSessionDescription> {
    if offer.sdp_type != RTCSdpType::Offer {
        return Err(Error::Protocol(format!(
            "expected an offer, got {}",
            offer.sdp_type
        )));
    }

    let pc = engine::server_peer_connection(&config.ice).await?;
    let session = Arc::new(EchoSession::new(pc));

    match negotiate(&session, registry, offer).await {
        Ok(answer) => {
            registry.register(Arc::clone(&session)).await;
            Ok(answer)
        }
        Err(err) => {
            // Release everything; a failed negotiation must leave no session
            // behind.
            if let Err(close_err) = session.close().await {
                warn!(session = %session.id(), "cleanup close failed: {close_err}");
            }
            Err(err)
        }
    }
}

async fn negotiate(
    session: &Arc<EchoSession>,
    registry: &Arc<SessionRegistry>,
    offer: RTCSessionDescription,
) -> Result<RTCSessionDescription> {
    let session_id = session.id();
    let pc = session.connection();

    // Echo tracks must exist before the answer is created so their media
    // sections are negotiated.
    let tracks = EchoTrackPair::new();
    let audio_sender = pc
        .add_track(Arc::clone(&tracks.audio) as Arc<dyn TrackLocal + Send + Sync>)
        .await
        .map_err(|e| Error::Negotiation(format!("failed to add audio track: {e}")))?;
    let video_sender = pc
        .add_track(Arc::clone(&tracks.video) as Arc<dyn TrackLocal + Send + Sync>)
        .await
        .map_err(|e| Error::Negotiation(format!("failed to add video track: {e}")))?;

    media::spawn_rtcp_drain(Arc::clone(&audio_sender));
    media::spawn_rtcp_drain(Arc::clone(&video_sender));

    // Relay every inbound track onto the outbound track of the same kind.
    // The routing-identifier mapping is resolved once, at relay start.
    let pc_weak = Arc::downgrade(pc);
    pc.on_track(Box::new(move |remote, _receiver, _transceiver| {
        let out_track = tracks.for_kind(remote.kind());
        let out_sender = match remote.kind() {
            RTPCodecType::Audio => Arc::clone(&audio_sender),
            _ => Arc::clone(&video_sender),
        };
        let pc_weak = pc_weak.clone();
        Box::pin(async move {
            let kind = remote.kind();
            info!(session = %session_id, %kind, ssrc = remote.ssrc(), "remote track started");

            if kind == RTPCodecType::Video {
                media::spawn_keyframe_requester(pc_weak, remote.ssrc());
            }

            let binding = media::RelayBinding::resolve(&out_sender).await;
            media::spawn_relay(remote, out_track, binding);
        })
    }));

    // Connection-state callbacks are forwarded into a channel; the consumer
    // task owns the teardown decision, keeping engine callbacks re-entrancy
    // free.
    let (state_tx, mut state_rx) = mpsc::channel::<RTCPeerConnectionState>(8);
    pc.on_peer_connection_state_change(Box::new(move |state| {
        let tx = state_tx.clone();
        Box::pin(async move {
            let _ = tx.send(state).await;
        })
    }));

    tokio::spawn({
        let registry = Arc::clone(registry);
        async move {
            while let Some(state) = state_rx.recv().await {
                info!(session = %session_id, %state, "peer connection state changed");
                match state {
                    RTCPeerConnectionState::Failed => {
                        // Idempotent against a concurrent removal.
                        registry.remove_and_close(session_id).await;
                    }
                    RTCPeerConnectionState::Closed => break,
                    _ => {}
                }
            }
        }
    });

    pc.set_remote_description(offer)
        .await
        .map_err(|e| Error::Negotiation(format!("failed to apply remote offer: {e}")))?;

    let answer = pc
        .create_answer(None)
        .await
        .map_err(|e| Error::Negotiation(format!("failed to create answer: {e}")))?;

    // The promise must be armed before the local description starts the
    // gatherers.
    let mut gather_complete = pc.gathering_complete_promise().await;

    pc.set_local_description(answer)
        .await
        .map_err(|e| Error::Negotiation(format!("failed to apply local answer: {e}")))?;

    // Non-trickle: only one message goes back, so it must carry every
    // candidate. Block until gathering reports completion.
    let _ = gather_complete.recv().await;

    pc.local_description().await.ok_or_else(|| {
        Error::Negotiation("local description missing after gathering".to_string())
    })
}
