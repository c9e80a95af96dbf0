//! Tracker frame ingestion
//!
//! The external tracker posts one [`FramePayload`] per camera cycle. Payloads
//! are decoded in the HTTP handler and queued for the engagement loop, which
//! reads them through [`ChannelDetectionSource`].

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tokio::sync::mpsc;

use robot_chat_core::{Detection, DetectionSource, Error, Frame, Result, TrackedFrame};

use crate::ServerError;

/// One capture cycle, or the reason it failed
pub type Capture = Result<TrackedFrame>;

pub type FrameSender = mpsc::Sender<Capture>;

/// Body of `POST /api/frames`
#[derive(Debug, Clone, Deserialize)]
pub struct FramePayload {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Encoded JPEG or PNG
    #[serde(default)]
    pub image_base64: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Set by the tracker when this cycle's capture failed
    #[serde(default)]
    pub error: Option<String>,
}

impl FramePayload {
    /// Decode into a capture result for the engagement loop.
    ///
    /// A tracker-reported error becomes a failed cycle; a payload that
    /// cannot be decoded is rejected.
    pub fn into_capture(self) -> std::result::Result<Capture, ServerError> {
        if let Some(error) = self.error {
            return Ok(Err(Error::Capture(error)));
        }

        if self.width == 0 || self.height == 0 {
            return Err(ServerError::InvalidRequest(
                "frame width and height are required".to_string(),
            ));
        }
        let data = base64::engine::general_purpose::STANDARD
            .decode(self.image_base64.as_bytes())
            .map_err(|e| ServerError::InvalidRequest(format!("image_base64: {}", e)))?;
        if data.is_empty() {
            return Err(ServerError::InvalidRequest("empty image".to_string()));
        }

        Ok(Ok(TrackedFrame {
            frame: Frame::new(self.width, self.height, data),
            detections: self.detections,
        }))
    }
}

/// Detection source fed by the HTTP frame endpoint
pub struct ChannelDetectionSource {
    rx: mpsc::Receiver<Capture>,
}

#[async_trait]
impl DetectionSource for ChannelDetectionSource {
    async fn next_frame(&mut self) -> Option<Result<TrackedFrame>> {
        self.rx.recv().await
    }
}

/// Bounded queue between the frame endpoint and the engagement loop
pub fn frame_channel(capacity: usize) -> (FrameSender, ChannelDetectionSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ChannelDetectionSource { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_chat_core::TrackStatus;

    fn payload(json: serde_json::Value) -> FramePayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_decode_frame() {
        let p = payload(serde_json::json!({
            "width": 640,
            "height": 480,
            "image_base64": "/9j/4AAQ",
            "detections": [{
                "id": 3,
                "label": "person",
                "status": "tracked",
                "position": {"x": 10.0, "y": -5.0, "z": 1800.0}
            }]
        }));

        let frame = p.into_capture().unwrap().unwrap();
        assert_eq!(frame.frame.width, 640);
        assert_eq!(frame.frame.data(), &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10][..]);
        assert_eq!(frame.detections[0].status, TrackStatus::Tracked);
    }

    #[test]
    fn test_tracker_error_is_failed_cycle() {
        let p = payload(serde_json::json!({"error": "camera timeout"}));
        let capture = p.into_capture().unwrap();
        assert!(matches!(capture, Err(Error::Capture(_))));
    }

    #[test]
    fn test_bad_base64_rejected() {
        let p = payload(serde_json::json!({
            "width": 2, "height": 2, "image_base64": "not base64!"
        }));
        assert!(matches!(p.into_capture(), Err(ServerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_channel_source_closes() {
        let (tx, mut source) = frame_channel(2);
        tx.send(Err(Error::Capture("x".to_string()))).await.unwrap();
        drop(tx);

        assert!(matches!(source.next_frame().await, Some(Err(_))));
        assert!(source.next_frame().await.is_none());
    }
}
