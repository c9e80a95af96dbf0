//! Collaborator traits
//!
//! Every external service the conversation core talks to sits behind one of
//! these traits, which keeps the dispatcher testable with scripted mocks.
//!
//! ```text
//! ChatModel         : message history -> live token stream
//! SpeechDispatcher  : sentence -> spoken audio (fire-and-forget)
//! MotionDispatcher  : motion command -> robot motion
//! DetectionSource   : camera + tracker -> per-frame detections
//! ```

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{Message, MotionCommand, Result, TrackedFrame};

/// Completion mode requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    /// Plain streamed completion
    #[default]
    Chat,
    /// Completion plus an out-of-band motion choice
    ChatWithMotion,
}

/// A streamed chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub mode: ChatMode,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            mode: ChatMode::Chat,
        }
    }

    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One item of a model stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next piece of response text
    Token(String),
    /// Motion picked by the model (ChatWithMotion mode only)
    Motion(String),
}

/// Live model output, terminated by stream close
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Remote language model
#[async_trait]
pub trait ChatModel: Send + Sync + 'static {
    /// Open a streamed completion.
    ///
    /// Errors returned here mean the stream could not be opened at all.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream>;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;
}

/// Speech synthesis service (sentence in, audio out)
#[async_trait]
pub trait SpeechDispatcher: Send + Sync + 'static {
    /// Queue one sentence for synthesis
    async fn set_text(&self, sentence: &str) -> Result<()>;

    /// Enable or disable playback on the speech service
    async fn set_play_flag(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }
}

/// Robot motion service
#[async_trait]
pub trait MotionDispatcher: Send + Sync + 'static {
    async fn set_motion(&self, command: &MotionCommand) -> Result<()>;
}

/// Camera and tracker output
#[async_trait]
pub trait DetectionSource: Send {
    /// Next frame with its detections.
    ///
    /// `None` means the source is closed. `Some(Err(_))` is a capture hiccup
    /// for this cycle only.
    async fn next_frame(&mut self) -> Option<Result<TrackedFrame>>;
}
