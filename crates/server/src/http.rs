//! HTTP Endpoints
//!
//! ```text
//! POST /api/gpt     {text, is_finish} -> {success}   SetGpt
//! POST /api/motion  {}                -> {success}   SendMotion
//! POST /api/frames  FramePayload      -> 202 | 400   tracker ingestion
//! GET  /health
//! GET  /metrics
//! ```

use axum::{
    extract::{Json, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use robot_chat_agent::EngagementState;
use robot_chat_core::TurnRequest;

use crate::metrics::{metrics_handler, record_request};
use crate::source::FramePayload;
use crate::state::AppState;
use crate::ServerError;

/// Reply of the turn RPCs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(state.settings.server.cors_enabled);

    Router::new()
        // Turn RPCs from the speech recognizer
        .route("/api/gpt", post(set_gpt))
        .route("/api/motion", post(send_motion))
        // Tracker output
        .route("/api/frames", post(post_frames))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(state)
}

fn build_cors_layer(enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::new();
    }
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// SetGpt: answer one utterance; replies once the turn is over
async fn set_gpt(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Json<SuccessResponse> {
    let success = state.dispatcher.handle_turn(&request).await;
    record_request("/api/gpt", StatusCode::OK);
    Json(SuccessResponse { success })
}

/// SendMotion: flush the reserved motion
async fn send_motion(State(state): State<AppState>) -> Json<SuccessResponse> {
    let success = state.dispatcher.send_motion().await;
    record_request("/api/motion", StatusCode::OK);
    Json(SuccessResponse { success })
}

async fn post_frames(
    State(state): State<AppState>,
    Json(payload): Json<FramePayload>,
) -> Result<StatusCode, ServerError> {
    let result = enqueue_frame(&state, payload);
    let status = match &result {
        Ok(status) => *status,
        Err(ServerError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    record_request("/api/frames", status);
    result
}

fn enqueue_frame(state: &AppState, payload: FramePayload) -> Result<StatusCode, ServerError> {
    let capture = payload.into_capture()?;

    match state.frames.try_send(capture) {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(TrySendError::Full(_)) => {
            // the engagement loop is behind; the next frame supersedes this one
            tracing::debug!("Frame queue full, dropping frame");
            metrics::counter!("robot_chat_frames_dropped_total").increment(1);
            Ok(StatusCode::ACCEPTED)
        }
        Err(TrySendError::Closed(_)) => Err(ServerError::Unavailable(
            "engagement loop is not running".to_string(),
        )),
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let settings = &state.settings;
    let engagement = match *state.engagement.borrow() {
        EngagementState::Idle => serde_json::json!({ "state": "idle" }),
        EngagementState::Engaged { id } => serde_json::json!({ "state": "engaged", "id": id }),
    };

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": settings.dispatcher.mode,
        "models": {
            "chat": settings.llm.chat_model,
            "judge": settings.llm.judge_model,
            "vision": settings.llm.vision_model,
        },
        "engagement": engagement,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::watch;
    use tower::ServiceExt;

    use robot_chat_agent::{
        ConversationState, FrameStore, MotionReservation, SpeechSink, TurnDispatcher,
        TurnDispatcherConfig,
    };
    use robot_chat_config::Settings;
    use robot_chat_core::{
        ChatModel, ChatRequest, ChatStream, DetectionSource, Error, MotionCommand,
        MotionDispatcher, Result, SpeechDispatcher,
    };
    use robot_chat_llm::PromptBuilder;

    use crate::source::{frame_channel, ChannelDetectionSource};

    struct Unreachable;

    #[async_trait]
    impl ChatModel for Unreachable {
        async fn stream_chat(&self, _request: ChatRequest) -> Result<ChatStream> {
            Err(Error::Llm("connection refused".to_string()))
        }

        fn default_model(&self) -> &str {
            "unreachable"
        }
    }

    struct Silent;

    #[async_trait]
    impl SpeechDispatcher for Silent {
        async fn set_text(&self, _sentence: &str) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl MotionDispatcher for Silent {
        async fn set_motion(&self, _command: &MotionCommand) -> Result<()> {
            Ok(())
        }
    }

    fn test_state(
        capacity: usize,
    ) -> (AppState, ChannelDetectionSource, watch::Sender<EngagementState>) {
        let settings = Arc::new(Settings::default());
        let dispatcher = TurnDispatcher::new(
            TurnDispatcherConfig::from_settings(&settings),
            Arc::new(Unreachable),
            SpeechSink::new(Arc::new(Silent)),
            Arc::new(MotionReservation::new(Arc::new(Silent))),
            Arc::new(ConversationState::new(PromptBuilder::default().system())),
            Arc::new(FrameStore::new()),
        );
        let (tx, source) = frame_channel(capacity);
        let (status_tx, status_rx) = watch::channel(EngagementState::Idle);

        let state = AppState::new(settings, Arc::new(dispatcher), tx, status_rx);
        (state, source, status_tx)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_mode_and_engagement() {
        let (state, _source, status) = test_state(4);
        let app = create_router(state);
        status.send_replace(EngagementState::Engaged { id: 7 });

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["mode"], "selective");
        assert_eq!(body["models"]["vision"], "gpt-4o");
        assert_eq!(body["engagement"]["state"], "engaged");
        assert_eq!(body["engagement"]["id"], 7);
    }

    #[tokio::test]
    async fn test_short_text_succeeds_without_model() {
        let (state, _source, _status) = test_state(4);
        let response = create_router(state)
            .oneshot(post_json("/api/gpt", serde_json::json!({"text": "あ", "is_finish": true})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"success": true}));
    }

    #[tokio::test]
    async fn test_failed_model_reports_failure() {
        let (state, _source, _status) = test_state(4);
        let response = create_router(state)
            .oneshot(post_json(
                "/api/gpt",
                serde_json::json!({"text": "今日の天気は?", "is_finish": true}),
            ))
            .await
            .unwrap();

        assert_eq!(body_json(response).await, serde_json::json!({"success": false}));
    }

    #[tokio::test]
    async fn test_send_motion_selective_is_noop() {
        let (state, _source, _status) = test_state(4);
        let response = create_router(state)
            .oneshot(post_json("/api/motion", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(body_json(response).await, serde_json::json!({"success": true}));
    }

    #[tokio::test]
    async fn test_frames_queued_for_engagement_loop() {
        let (state, mut source, _status) = test_state(4);
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/frames",
                serde_json::json!({"width": 2, "height": 2, "image_base64": "/9j/4AAQ"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app
            .clone()
            .oneshot(post_json("/api/frames", serde_json::json!({"error": "no frame"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app
            .oneshot(post_json(
                "/api/frames",
                serde_json::json!({"width": 2, "height": 2, "image_base64": "%%%"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(matches!(source.next_frame().await, Some(Ok(_))));
        assert!(matches!(source.next_frame().await, Some(Err(Error::Capture(_)))));
    }

    #[tokio::test]
    async fn test_frames_rejected_when_loop_stopped() {
        let (state, source, _status) = test_state(4);
        drop(source);

        let response = create_router(state)
            .oneshot(post_json("/api/frames", serde_json::json!({"error": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        crate::init_metrics().unwrap();
        let (state, _source, _status) = test_state(4);

        let response = create_router(state)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
