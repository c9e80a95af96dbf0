//! Error types shared across crates

use thiserror::Error;

/// Result alias used by the collaborator traits
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Speech dispatch error: {0}")]
    Speech(String),

    #[error("Motion dispatch error: {0}")]
    Motion(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Conversation error: {0}")]
    Conversation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}
