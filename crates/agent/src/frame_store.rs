//! Latest tracker frame, shared between the engagement loop and turns

use parking_lot::RwLock;
use robot_chat_core::{describe_scene, Frame, TrackedFrame};

#[derive(Default)]
pub struct FrameStore {
    latest: RwLock<Option<TrackedFrame>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, frame: TrackedFrame) {
        *self.latest.write() = Some(frame);
    }

    pub fn latest(&self) -> Option<TrackedFrame> {
        self.latest.read().clone()
    }

    /// Camera image of the latest frame
    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest.read().as_ref().map(|f| f.frame.clone())
    }

    /// Recognition summary of the visible detections, if there are any
    pub fn scene_summary(&self) -> Option<String> {
        let latest = self.latest.read();
        let detections = &latest.as_ref()?.detections;
        if detections.iter().any(|d| d.status.is_visible()) {
            Some(describe_scene(detections))
        } else {
            None
        }
    }
}
