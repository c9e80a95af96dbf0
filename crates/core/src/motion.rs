//! Motion commands sent to the robot's motion service

use serde::{Deserialize, Serialize};

/// A named motion with playback options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionCommand {
    pub name: String,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub clear: bool,
}

impl MotionCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            repeat: false,
            clear: false,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }
}
