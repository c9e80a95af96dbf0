//! Conversation core of the camera robot
//!
//! - [`ConversationState`]: permanent history with snapshot/commit
//! - [`EngagementTracker`]: picks the current interlocutor from tracker output
//! - [`TurnDispatcher`]: streams model replies into speech and motion
//! - [`Greeter`] and [`EngagementLoop`]: greet people as they approach

pub mod conversation;
pub mod dispatcher;
pub mod engagement;
pub mod engagement_loop;
pub mod frame_store;
pub mod greeting;
pub mod motion;
pub mod speech;

pub use conversation::ConversationState;
pub use dispatcher::{TurnDispatcher, TurnDispatcherConfig, TurnOutcome};
pub use engagement::{EngagementEvent, EngagementState, EngagementTracker};
pub use engagement_loop::EngagementLoop;
pub use frame_store::FrameStore;
pub use greeting::{crop_person, Greeter, GreetingOutcome};
pub use motion::{DeferredMotion, MotionReservation};
pub use speech::{SentenceSource, SpeechSink};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Conversation error: {0}")]
    Conversation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

impl From<robot_chat_core::Error> for AgentError {
    fn from(err: robot_chat_core::Error) -> Self {
        use robot_chat_core::Error;
        match err {
            Error::Llm(msg) => AgentError::Llm(msg),
            Error::Timeout(msg) => AgentError::Timeout(msg),
            Error::Image(msg) => AgentError::Image(msg),
            Error::Conversation(msg) => AgentError::Conversation(msg),
            other => AgentError::Dispatch(other.to_string()),
        }
    }
}

impl From<AgentError> for robot_chat_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Timeout(msg) => robot_chat_core::Error::Timeout(msg),
            AgentError::Llm(msg) => robot_chat_core::Error::Llm(msg),
            other => robot_chat_core::Error::Conversation(other.to_string()),
        }
    }
}
