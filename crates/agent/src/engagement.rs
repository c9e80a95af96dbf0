//! Interlocutor selection
//!
//! ```text
//! Idle    --[Tracked detection with z <= distance]--> Engaged(id)
//! Engaged --[engaged id missing from the frame]-----> Idle
//! Engaged --[engaged id present, any status]-------> Engaged
//! ```
//!
//! At most one transition happens per frame. A frame that could not be
//! captured leaves the state untouched.

use robot_chat_config::EngagementConfig;
use robot_chat_core::{Detection, PixelRect, TrackStatus, TrackedFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngagementState {
    #[default]
    Idle,
    Engaged {
        id: i64,
    },
}

/// Result of observing one frame
#[derive(Debug, Clone, PartialEq)]
pub enum EngagementEvent {
    Unchanged,
    /// A new interlocutor was selected
    Engaged {
        detection: Detection,
        /// Bounding box of the detection in frame pixels
        region: PixelRect,
    },
    /// The engaged id left the detection set
    Disengaged { id: i64 },
}

#[derive(Debug, Clone)]
pub struct EngagementTracker {
    state: EngagementState,
    greeting_distance_mm: f32,
    target_label: Option<String>,
}

impl EngagementTracker {
    pub fn new(greeting_distance_mm: f32) -> Self {
        Self {
            state: EngagementState::Idle,
            greeting_distance_mm,
            target_label: None,
        }
    }

    pub fn from_config(config: &EngagementConfig) -> Self {
        Self {
            target_label: config.target_label.clone(),
            ..Self::new(config.greeting_distance_mm)
        }
    }

    /// Only engage detections carrying this label
    pub fn with_target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = Some(label.into());
        self
    }

    pub fn state(&self) -> EngagementState {
        self.state
    }

    pub fn engaged_id(&self) -> Option<i64> {
        match self.state {
            EngagementState::Engaged { id } => Some(id),
            EngagementState::Idle => None,
        }
    }

    /// Feed one frame; `None` is a capture hiccup and changes nothing
    pub fn observe(&mut self, frame: Option<&TrackedFrame>) -> EngagementEvent {
        let Some(frame) = frame else {
            return EngagementEvent::Unchanged;
        };

        match self.state {
            EngagementState::Engaged { id } => {
                if frame.detections.iter().any(|d| d.id == id) {
                    EngagementEvent::Unchanged
                } else {
                    tracing::info!(engaged_id = id, "Interlocutor left");
                    self.state = EngagementState::Idle;
                    EngagementEvent::Disengaged { id }
                }
            }
            EngagementState::Idle => match frame.detections.iter().find(|d| self.is_candidate(d)) {
                Some(detection) => {
                    tracing::info!(
                        engaged_id = detection.id,
                        label = %detection.label,
                        distance_mm = detection.position.z,
                        "Interlocutor engaged"
                    );
                    self.state = EngagementState::Engaged { id: detection.id };
                    EngagementEvent::Engaged {
                        detection: detection.clone(),
                        region: detection.roi.denormalize(frame.frame.width, frame.frame.height),
                    }
                }
                None => EngagementEvent::Unchanged,
            },
        }
    }

    fn is_candidate(&self, detection: &Detection) -> bool {
        detection.status == TrackStatus::Tracked
            && detection.position.z <= self.greeting_distance_mm
            && self
                .target_label
                .as_deref()
                .map_or(true, |label| detection.label == label)
    }
}
