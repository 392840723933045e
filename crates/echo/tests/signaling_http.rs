//! End-to-end exercises of the HTTP signaling surface using in-process
//! requests against the router, no sockets involved.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use echo_rtc::{build_router, engine, AppState, EchoConfig, SessionRegistry};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

fn offline_state() -> AppState {
    let mut config = EchoConfig::default();
    // Host candidates only; keeps the tests off the network.
    config.ice.stun_servers.clear();
    AppState::new(Arc::new(SessionRegistry::new()), Arc::new(config))
}

/// Build a realistic video offer the way a client would: local track added,
/// candidates fully gathered.
async fn gathered_video_offer(state: &AppState) -> RTCSessionDescription {
    let pc = engine::client_peer_connection(&state.config.ice)
        .await
        .expect("client peer connection");

    let track = Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            ..Default::default()
        },
        "video".to_owned(),
        "test".to_owned(),
    ));
    pc.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
        .await
        .expect("add track");

    let offer = pc.create_offer(None).await.expect("create offer");
    let mut gather_complete = pc.gathering_complete_promise().await;
    pc.set_local_description(offer)
        .await
        .expect("set local description");
    let _ = gather_complete.recv().await;

    pc.local_description().await.expect("gathered offer")
}

fn offer_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/offer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn valid_offer_yields_candidate_bearing_answer_and_a_session() {
    let state = offline_state();
    let app = build_router(state.clone());

    let offer = gathered_video_offer(&state).await;
    let body = serde_json::to_vec(&offer).unwrap();

    let response = app.oneshot(offer_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let answer: RTCSessionDescription = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(answer.sdp_type.to_string(), "answer");
    assert!(answer.sdp.contains("m=video"), "answer has no video section");
    // Non-trickle: the one answer must already carry candidates.
    assert!(
        answer.sdp.contains("a=candidate"),
        "answer carries no candidates"
    );

    assert_eq!(state.registry.len().await, 1);
}

#[tokio::test]
async fn malformed_payload_is_rejected_without_a_session() {
    let state = offline_state();
    let app = build_router(state.clone());

    let response = app
        .oneshot(offer_request(b"{not json".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    assert!(state.registry.is_empty().await);
}

#[tokio::test]
async fn rejected_offer_leaves_the_server_answering() {
    let state = offline_state();

    // First request is garbage, second is a proper offer. The failure must
    // be scoped to its own request.
    let response = build_router(state.clone())
        .oneshot(offer_request(b"[]".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let offer = gathered_video_offer(&state).await;
    let body = serde_json::to_vec(&offer).unwrap();
    let response = build_router(state.clone())
        .oneshot(offer_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.registry.len().await, 1);
}

#[tokio::test]
async fn health_reports_session_count() {
    let state = offline_state();
    let app = build_router(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
}
