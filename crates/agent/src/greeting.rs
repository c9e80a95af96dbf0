//! Vision greeting for a newly engaged person
//!
//! Sends the greeting prompt with the cropped person image to the vision
//! model and speaks the reply. Each greeting runs as its own task, which
//! crops the person out of the frame off the async threads, with a
//! cancellation token that the engagement loop cancels when the person
//! leaves; the task checks it before every sentence.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use robot_chat_core::{ChatModel, ChatRequest, Frame, Message, PixelRect, StreamEvent};
use robot_chat_llm::PromptBuilder;
use robot_chat_pipeline::SentenceSegmenter;

use crate::conversation::ConversationState;
use crate::speech::{SentenceSource, SpeechSink};
use crate::AgentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GreetingOutcome {
    Spoken(String),
    /// The person left before the greeting finished
    Cancelled,
}

pub struct Greeter {
    model: Arc<dyn ChatModel>,
    speech: SpeechSink,
    conversation: Arc<ConversationState>,
    prompts: PromptBuilder,
    vision_model: String,
}

impl Greeter {
    pub fn new(
        model: Arc<dyn ChatModel>,
        speech: SpeechSink,
        conversation: Arc<ConversationState>,
        prompts: PromptBuilder,
        vision_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            speech,
            conversation,
            prompts,
            vision_model: vision_model.into(),
        }
    }

    /// Crop `region` out of `frame` and run [`Greeter::greet`] on its own task
    pub fn spawn(
        self: &Arc<Self>,
        frame: Frame,
        region: PixelRect,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let greeter = Arc::clone(self);
        tokio::spawn(async move {
            let person = match crop_person(frame, region).await {
                Ok(person) => person,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not crop person");
                    return;
                }
            };
            match greeter.greet(person, cancel).await {
                Ok(GreetingOutcome::Spoken(reply)) => {
                    tracing::info!(reply = %reply, "Greeting finished");
                }
                Ok(GreetingOutcome::Cancelled) => {
                    tracing::info!("Greeting cancelled");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Greeting failed");
                }
            }
        })
    }

    pub async fn greet(
        &self,
        person: Frame,
        cancel: CancellationToken,
    ) -> Result<GreetingOutcome, AgentError> {
        let _turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(GreetingOutcome::Cancelled),
            guard = self.conversation.lock_turn() => guard,
        };
        let mut history = self.conversation.snapshot();

        let user = self.prompts.greeting(person);
        let mut messages = history.clone();
        messages.push(user.clone());

        let request = ChatRequest::new(messages, self.vision_model.clone());
        let mut stream = self.model.stream_chat(request).await?;

        let mut segmenter = SentenceSegmenter::new();
        let mut reply = String::new();

        while let Some(event) = stream.next().await {
            let StreamEvent::Token(token) = event? else {
                continue;
            };
            reply.push_str(&token);

            for sentence in segmenter.push(&token) {
                if cancel.is_cancelled() {
                    return Ok(GreetingOutcome::Cancelled);
                }
                self.speech.set_play_flag(true).await;
                self.speech.say(&sentence, SentenceSource::Greeting).await;
            }
        }

        // history keeps the greeting without the image
        history.push(user.without_image());
        history.push(Message::assistant(reply.clone()));
        self.conversation.commit_from(history)?;

        Ok(GreetingOutcome::Spoken(reply))
    }
}

/// Decode, crop and re-encode on the blocking pool
pub async fn crop_person(frame: Frame, region: PixelRect) -> Result<Frame, AgentError> {
    tokio::task::spawn_blocking(move || frame.crop(region))
        .await
        .map_err(|e| AgentError::Image(format!("crop task failed: {}", e)))?
        .map_err(AgentError::from)
}
