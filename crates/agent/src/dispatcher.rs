//! Turn dispatch
//!
//! Handles one utterance from the speech recognizer end to end:
//!
//! ```text
//! partial (is_finish = false): short-response prompt -> stream -> speak
//! final, non-selective       : full-response prompt  -> stream -> speak -> commit
//! final, selective           : judge prompt -> stream -> decode -> speak talk
//!                                 vision requested? filler + lookup motion
//!                                 -> vision stream -> speak -> commit
//! ```
//!
//! Every sentence is spoken before the next token is read, so speech order
//! follows generation order. Speech and motion failures never end a turn; a
//! model stream that fails to open or breaks mid-way does.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

use robot_chat_config::{DispatchMode, Settings};
use robot_chat_core::{
    ChatMode, ChatModel, ChatRequest, ChatStream, Message, MotionCommand, StreamEvent,
    StreamedDecision, TurnRequest,
};
use robot_chat_llm::PromptBuilder;
use robot_chat_pipeline::{IncrementalJsonDecoder, SentenceSegmenter};

use crate::conversation::ConversationState;
use crate::frame_store::FrameStore;
use crate::motion::{DeferredMotion, MotionReservation};
use crate::speech::{SentenceSource, SpeechSink};
use crate::AgentError;

#[derive(Debug, Clone)]
pub struct TurnDispatcherConfig {
    pub mode: DispatchMode,
    /// Utterances with fewer characters are ignored
    pub min_text_chars: usize,
    pub filler_text: String,
    pub attach_scene_summary: bool,
    pub chat_model: String,
    pub judge_model: String,
    pub vision_model: String,
    pub lookup_motion: MotionCommand,
    pub prompts: PromptBuilder,
}

impl TurnDispatcherConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let lookup = &settings.motion.lookup_motion;
        Self {
            mode: settings.dispatcher.mode,
            min_text_chars: settings.dispatcher.min_text_chars,
            filler_text: settings.dispatcher.filler_text.clone(),
            attach_scene_summary: settings.dispatcher.attach_scene_summary,
            chat_model: settings.llm.chat_model.clone(),
            judge_model: settings.llm.judge_model.clone(),
            vision_model: settings.llm.vision_model.clone(),
            lookup_motion: MotionCommand::new(lookup.name.clone())
                .with_priority(lookup.priority)
                .with_repeat(lookup.repeat)
                .with_clear(lookup.clear),
            prompts: PromptBuilder::new(settings.prompts.clone()),
        }
    }
}

impl Default for TurnDispatcherConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// What a turn ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Too short to be an utterance
    Ignored,
    Answered {
        reply: String,
        /// Re-asked with the camera image
        escalated: bool,
    },
}

pub struct TurnDispatcher {
    config: TurnDispatcherConfig,
    model: Arc<dyn ChatModel>,
    speech: SpeechSink,
    motion: Arc<MotionReservation>,
    conversation: Arc<ConversationState>,
    frames: Arc<FrameStore>,
    decoder: IncrementalJsonDecoder,
}

impl TurnDispatcher {
    pub fn new(
        config: TurnDispatcherConfig,
        model: Arc<dyn ChatModel>,
        speech: SpeechSink,
        motion: Arc<MotionReservation>,
        conversation: Arc<ConversationState>,
        frames: Arc<FrameStore>,
    ) -> Self {
        Self {
            config,
            model,
            speech,
            motion,
            conversation,
            frames,
            decoder: IncrementalJsonDecoder::default(),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.config.mode
    }

    pub fn conversation(&self) -> &Arc<ConversationState> {
        &self.conversation
    }

    /// SetGpt: run the turn and report success
    pub async fn handle_turn(&self, request: &TurnRequest) -> bool {
        match self.run_turn(request).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, is_finish = request.is_finish, "Turn failed");
                false
            }
        }
    }

    pub async fn run_turn(&self, request: &TurnRequest) -> Result<TurnOutcome, AgentError> {
        let chars = request.text.chars().count();
        if chars < self.config.min_text_chars {
            tracing::debug!(chars, "Ignoring short utterance");
            return Ok(TurnOutcome::Ignored);
        }

        let kind = if request.is_finish { "final" } else { "partial" };
        let span = tracing::info_span!("turn", turn_id = %Uuid::new_v4(), kind);
        let start = Instant::now();

        let result = self.dispatch(request).instrument(span).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("robot_chat_turns_total", "kind" => kind, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("robot_chat_turn_duration_seconds", "kind" => kind)
            .record(start.elapsed().as_secs_f64());

        result
    }

    async fn dispatch(&self, request: &TurnRequest) -> Result<TurnOutcome, AgentError> {
        tracing::info!(text = %request.text, "Receive");

        let (reply, escalated) = match (request.is_finish, self.config.mode) {
            (false, _) => (self.partial_turn(&request.text).await?, false),
            (true, DispatchMode::NonSelective) => (self.final_turn(&request.text).await?, false),
            (true, DispatchMode::Selective) => self.selective_turn(&request.text).await?,
        };

        Ok(TurnOutcome::Answered { reply, escalated })
    }

    /// SendMotion: flush the reserved motion.
    ///
    /// In selective mode motion is driven by the turns themselves, so this
    /// does nothing and reports success.
    pub async fn send_motion(&self) -> bool {
        match self.config.mode {
            DispatchMode::Selective => {
                tracing::debug!("SendMotion ignored in selective mode");
                true
            }
            DispatchMode::NonSelective => self.motion.send_reserved().await,
        }
    }

    async fn partial_turn(&self, text: &str) -> Result<String, AgentError> {
        let mut messages = self.conversation.snapshot();
        messages.push(self.config.prompts.short_response(text));

        let mode = match self.config.mode {
            DispatchMode::NonSelective => ChatMode::ChatWithMotion,
            DispatchMode::Selective => ChatMode::Chat,
        };
        let request = ChatRequest::new(messages, self.config.chat_model.clone()).with_mode(mode);
        let stream = self.model.stream_chat(request).await?;

        self.speak_stream(stream, SentenceSource::Partial).await
    }

    async fn final_turn(&self, text: &str) -> Result<String, AgentError> {
        let _turn = self.conversation.lock_turn().await;
        let history = self.conversation.snapshot();
        let text = self.with_scene(text);

        let user = self.config.prompts.full_response(&text);
        let mut messages = history.clone();
        messages.push(user.clone());

        let request = ChatRequest::new(messages, self.config.chat_model.clone());
        let stream = self.model.stream_chat(request).await?;
        let reply = self.speak_stream(stream, SentenceSource::Final).await?;

        self.commit(history, user, &reply)?;
        Ok(reply)
    }

    async fn selective_turn(&self, text: &str) -> Result<(String, bool), AgentError> {
        let _turn = self.conversation.lock_turn().await;
        let history = self.conversation.snapshot();
        let text = self.with_scene(text);

        let mut messages = history.clone();
        messages.push(self.config.prompts.judge(&text));
        let request = ChatRequest::new(messages, self.config.judge_model.clone());
        let mut stream = self.model.stream_chat(request).await?;

        let mut buffer = String::new();
        let mut segmenter = SentenceSegmenter::new();
        let mut deferred = DeferredMotion::default();
        let mut decision: Option<StreamedDecision> = None;
        let mut escalate = false;

        // the judge stream is drained to the end even after escalation
        while let Some(event) = stream.next().await {
            let StreamEvent::Token(token) = event? else {
                continue;
            };
            buffer.push_str(&token);
            if escalate {
                continue;
            }

            let Some(current) = self.decoder.decode(&buffer) else {
                continue;
            };
            if let Some(ref name) = current.motion {
                deferred.set(MotionCommand::new(name.clone()));
            }

            if current.vision_requested {
                tracing::info!("Judge requested the camera");
                escalate = true;
            } else {
                for sentence in segmenter.advance(&current.talk_so_far) {
                    if sentence.trim().is_empty() {
                        continue;
                    }
                    deferred.fire(&self.motion).await;
                    self.speech.say(&sentence, SentenceSource::Judge).await;
                }
            }
            decision = Some(current);
        }

        // an object cut off before its closing brace still carries the flag
        if !escalate {
            if let Some(last) = self.decoder.decode_final(&buffer) {
                if last.vision_requested {
                    tracing::info!("Judge requested the camera in an unterminated answer");
                    escalate = true;
                }
                decision = Some(last);
            }
        }

        let user = self.config.prompts.full_response(&text);

        if escalate {
            let reply = self.escalate_to_vision(&history, &text).await?;
            self.commit(history, user, &reply)?;
            return Ok((reply, true));
        }

        let reply = match decision {
            Some(decision) => decision.talk_so_far,
            None => {
                tracing::warn!("Judge output held no JSON object, speaking it as plain text");
                for sentence in segmenter.advance(&buffer) {
                    deferred.fire(&self.motion).await;
                    self.speech.say(&sentence, SentenceSource::Judge).await;
                }
                buffer
            }
        };

        self.commit(history, user, &reply)?;
        Ok((reply, false))
    }

    async fn escalate_to_vision(&self, history: &[Message], text: &str) -> Result<String, AgentError> {
        self.speech
            .say(&self.config.filler_text, SentenceSource::Filler)
            .await;
        self.motion.send(&self.config.lookup_motion).await;

        let user = match self.frames.latest_frame() {
            Some(frame) => self.config.prompts.vision_query(text, frame),
            None => {
                tracing::warn!("No camera frame available, asking without an image");
                self.config.prompts.full_response(text)
            }
        };

        let mut messages = history.to_vec();
        messages.push(user);
        let request = ChatRequest::new(messages, self.config.vision_model.clone());
        let stream = self.model.stream_chat(request).await?;

        self.speak_stream(stream, SentenceSource::Vision).await
    }

    /// Speak each sentence of `stream` as it completes; returns the full text
    async fn speak_stream(
        &self,
        mut stream: ChatStream,
        source: SentenceSource,
    ) -> Result<String, AgentError> {
        let mut segmenter = SentenceSegmenter::new();
        let mut reply = String::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Token(token) => {
                    reply.push_str(&token);
                    for sentence in segmenter.push(&token) {
                        self.speech.say(&sentence, source).await;
                    }
                }
                StreamEvent::Motion(name) => self.motion.reserve(MotionCommand::new(name)),
            }
        }

        if !segmenter.pending().trim().is_empty() {
            tracing::debug!(pending = segmenter.pending(), "Unterminated text left unspoken");
        }
        Ok(reply)
    }

    fn with_scene(&self, text: &str) -> String {
        if !self.config.attach_scene_summary {
            return text.to_string();
        }
        match self.frames.scene_summary() {
            Some(summary) => format!("{}{}", text, summary),
            None => text.to_string(),
        }
    }

    fn commit(&self, mut history: Vec<Message>, user: Message, reply: &str) -> Result<(), AgentError> {
        history.push(user.without_image());
        history.push(Message::assistant(reply));
        self.conversation.commit_from(history)
    }
}
