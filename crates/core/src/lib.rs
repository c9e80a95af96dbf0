//! Core traits and types for the robot conversation front-end
//!
//! This crate provides foundational types used across all other crates:
//! - Tracker output (detections, frames, regions of interest)
//! - Conversation messages and turn requests
//! - Collaborator traits (chat model, speech, motion, detection source)
//! - Error types

pub mod detection;
pub mod error;
pub mod frame;
pub mod message;
pub mod motion;
pub mod traits;
pub mod turn;

pub use detection::{describe_scene, Detection, Position, Roi, TrackStatus, TrackedFrame};
pub use error::{Error, Result};
pub use frame::{Frame, PixelRect};
pub use message::{Message, Role};
pub use motion::MotionCommand;
pub use traits::{
    ChatMode, ChatModel, ChatRequest, ChatStream, DetectionSource, MotionDispatcher,
    SpeechDispatcher, StreamEvent,
};
pub use turn::{StreamedDecision, TurnRequest};
