//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use tokio::sync::watch;

use robot_chat_agent::{EngagementState, TurnDispatcher};
use robot_chat_config::Settings;

use crate::source::FrameSender;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<TurnDispatcher>,
    /// Queue feeding the engagement loop
    pub frames: FrameSender,
    pub engagement: watch::Receiver<EngagementState>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        dispatcher: Arc<TurnDispatcher>,
        frames: FrameSender,
        engagement: watch::Receiver<EngagementState>,
    ) -> Self {
        Self {
            settings,
            dispatcher,
            frames,
            engagement,
        }
    }
}
