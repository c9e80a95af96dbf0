//! Turn request and streamed judge decision

use serde::{Deserialize, Serialize};

/// An utterance forwarded by the speech recognizer
///
/// `is_finish = false` marks a partial utterance that only deserves a short,
/// reactive reply. `is_finish = true` marks the complete utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub text: String,
    #[serde(default, alias = "isFinish")]
    pub is_finish: bool,
}

impl TurnRequest {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_finish: false,
        }
    }

    pub fn finished(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_finish: true,
        }
    }
}

/// Best-effort reading of the judge model's still-arriving JSON output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamedDecision {
    pub vision_requested: bool,
    pub talk_so_far: String,
    /// Optional motion chosen by the judge, present once its value is complete
    pub motion: Option<String>,
}
