//! Tracker output types
//!
//! The external tracker yields one [`Detection`] per tracked object per frame.
//! Ids are stable across frames for the same physical object.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::frame::{Frame, PixelRect};

/// Track lifecycle reported by the tracker
///
/// Transitions are monotonic per id: New -> Tracked -> Lost/Removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// Newly created track, not yet confirmed
    #[default]
    New,
    /// Actively tracked object
    Tracked,
    /// Temporarily lost track
    Lost,
    /// Removed from tracking
    Removed,
}

impl TrackStatus {
    /// New or Tracked, i.e. the object is currently visible
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::New | Self::Tracked)
    }
}

/// Spatial position relative to the camera, in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Region of interest in normalized image coordinates (0.0..=1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl Default for Roi {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            y_min: 0.0,
            x_max: 1.0,
            y_max: 1.0,
        }
    }
}

impl Roi {
    /// Convert to pixel coordinates for a frame of the given size.
    ///
    /// The result is clamped to the frame bounds.
    pub fn denormalize(&self, width: u32, height: u32) -> PixelRect {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        let x1 = (clamp(self.x_min.min(self.x_max)) * width as f32) as u32;
        let y1 = (clamp(self.y_min.min(self.y_max)) * height as f32) as u32;
        let x2 = (clamp(self.x_min.max(self.x_max)) * width as f32) as u32;
        let y2 = (clamp(self.y_min.max(self.y_max)) * height as f32) as u32;
        PixelRect {
            x: x1,
            y: y1,
            width: x2.saturating_sub(x1),
            height: y2.saturating_sub(y1),
        }
    }
}

/// One tracked object in the current frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: i64,
    pub label: String,
    pub status: TrackStatus,
    pub position: Position,
    #[serde(default)]
    pub roi: Roi,
}

impl Detection {
    pub fn new(id: i64, label: impl Into<String>, status: TrackStatus, position: Position) -> Self {
        Self {
            id,
            label: label.into(),
            status,
            position,
            roi: Roi::default(),
        }
    }

    pub fn with_roi(mut self, roi: Roi) -> Self {
        self.roi = roi;
        self
    }
}

/// A camera frame together with the tracker output for it
#[derive(Debug, Clone)]
pub struct TrackedFrame {
    pub frame: Frame,
    pub detections: Vec<Detection>,
}

/// Render the visible detections as a recognition summary for the model.
///
/// Distances are reported in meters from the robot's point of view.
pub fn describe_scene(detections: &[Detection]) -> String {
    let mut text = String::from(" 認識結果 {\n");
    for detection in detections.iter().filter(|d| d.status.is_visible()) {
        let p = detection.position;
        let _ = write!(text, "種類: {},", detection.label);
        text.push_str("あなたから見た位置:");
        text.push_str(if p.x >= 0.0 { "右" } else { "左" });
        let _ = write!(text, "{:.2}メートル", p.x.abs() / 1000.0);
        text.push_str(if p.y >= 0.0 { "上" } else { "下" });
        let _ = write!(text, "{:.2}メートル", p.y.abs() / 1000.0);
        let _ = write!(text, "近さ {:.2}メートル", p.z.abs() / 1000.0);
        text.push('\n');
    }
    text.push('}');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_denormalize() {
        let roi = Roi {
            x_min: 0.25,
            y_min: 0.5,
            x_max: 0.75,
            y_max: 1.0,
        };
        let rect = roi.denormalize(640, 480);
        assert_eq!(rect.x, 160);
        assert_eq!(rect.y, 240);
        assert_eq!(rect.width, 320);
        assert_eq!(rect.height, 240);
    }

    #[test]
    fn test_roi_denormalize_clamps() {
        let roi = Roi {
            x_min: -0.2,
            y_min: 0.0,
            x_max: 1.4,
            y_max: 0.5,
        };
        let rect = roi.denormalize(100, 100);
        assert_eq!(rect.x, 0);
        assert_eq!(rect.width, 100);
        assert_eq!(rect.height, 50);
    }

    #[test]
    fn test_describe_scene_skips_lost() {
        let detections = vec![
            Detection::new(1, "person", TrackStatus::Tracked, Position::new(500.0, -200.0, 1500.0)),
            Detection::new(2, "cup", TrackStatus::Lost, Position::new(0.0, 0.0, 800.0)),
        ];
        let text = describe_scene(&detections);
        assert!(text.contains("種類: person"));
        assert!(text.contains("右0.50メートル"));
        assert!(text.contains("下0.20メートル"));
        assert!(text.contains("近さ 1.50メートル"));
        assert!(!text.contains("cup"));
    }

    #[test]
    fn test_status_visibility() {
        assert!(TrackStatus::New.is_visible());
        assert!(TrackStatus::Tracked.is_visible());
        assert!(!TrackStatus::Lost.is_visible());
        assert!(!TrackStatus::Removed.is_visible());
    }
}
