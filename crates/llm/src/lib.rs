//! Language model integration
//!
//! Features:
//! - OpenAI-compatible streaming chat backend (SSE), text and vision messages
//! - Chat-with-motion mode: a leading `[motion:<name>]` tag is reported out of band
//! - Prompt construction for partial, final, judge and greeting turns

pub mod backend;
pub mod motion_tag;
pub mod prompt;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use motion_tag::MotionTagFilter;
pub use prompt::PromptBuilder;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for robot_chat_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => robot_chat_core::Error::Timeout("model stream".to_string()),
            other => robot_chat_core::Error::Llm(other.to_string()),
        }
    }
}
