//! Robot Chat Server
//!
//! HTTP surface for the speech recognizer (turn RPCs) and the tracker
//! (frame ingestion), plus HTTP clients for the speech and motion services.

pub mod clients;
pub mod http;
pub mod metrics;
pub mod source;
pub mod state;

pub use clients::{HttpMotionClient, HttpSpeechClient};
pub use http::create_router;
pub use metrics::{init_metrics, record_request};
pub use source::{frame_channel, ChannelDetectionSource, FramePayload, FrameSender};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = StatusCode::from(self);
        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<robot_chat_config::ConfigError> for ServerError {
    fn from(err: robot_chat_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}
