//! Speech output for turns and greetings

use std::sync::Arc;

use robot_chat_core::SpeechDispatcher;

/// Where a spoken sentence came from, for logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceSource {
    Partial,
    Final,
    Judge,
    Vision,
    Filler,
    Greeting,
}

impl SentenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Partial => "partial",
            Self::Final => "final",
            Self::Judge => "judge",
            Self::Vision => "vision",
            Self::Filler => "filler",
            Self::Greeting => "greeting",
        }
    }
}

/// Sends sentences to the speech service; failures are logged and dropped
#[derive(Clone)]
pub struct SpeechSink {
    speech: Arc<dyn SpeechDispatcher>,
}

impl SpeechSink {
    pub fn new(speech: Arc<dyn SpeechDispatcher>) -> Self {
        Self { speech }
    }

    /// Speak one sentence. Blank sentences are skipped.
    pub async fn say(&self, sentence: &str, source: SentenceSource) -> bool {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return false;
        }

        tracing::info!(sentence, source = source.as_str(), "Send voice");
        metrics::counter!("robot_chat_sentences_total", "source" => source.as_str()).increment(1);

        match self.speech.set_text(sentence).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(sentence, error = %e, "Voice server send error");
                metrics::counter!("robot_chat_dispatch_errors_total", "target" => "speech")
                    .increment(1);
                false
            }
        }
    }

    pub async fn set_play_flag(&self, enabled: bool) {
        if let Err(e) = self.speech.set_play_flag(enabled).await {
            tracing::warn!(enabled, error = %e, "Voice play flag error");
            metrics::counter!("robot_chat_dispatch_errors_total", "target" => "speech")
                .increment(1);
        }
    }
}
