//! Prompt construction
//!
//! Wraps utterances into the user messages sent for each kind of turn.

use robot_chat_config::prompts::TEXT_PLACEHOLDER;
use robot_chat_config::PromptsConfig;
use robot_chat_core::{Frame, Message};

/// Builds turn messages from the configured templates
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    prompts: PromptsConfig,
}

impl PromptBuilder {
    pub fn new(prompts: PromptsConfig) -> Self {
        Self { prompts }
    }

    /// First message of a new conversation
    pub fn system(&self) -> Message {
        Message::system(self.prompts.system.clone())
    }

    /// Partial utterance: pick one short backchannel reply
    pub fn short_response(&self, text: &str) -> Message {
        Message::user(self.fill(&self.prompts.short_response, text))
    }

    /// Complete utterance: answer in one short sentence
    pub fn full_response(&self, text: &str) -> Message {
        Message::user(self.fill(&self.prompts.full_response, text))
    }

    /// Complete utterance plus the structured vision decision request
    pub fn judge(&self, text: &str) -> Message {
        let full = self.fill(&self.prompts.full_response, text);
        Message::user(format!("{}\n{}", full, self.prompts.judge_instruction))
    }

    /// Complete utterance re-asked with the camera image attached
    pub fn vision_query(&self, text: &str, frame: Frame) -> Message {
        Message::vision(self.fill(&self.prompts.full_response, text), frame)
    }

    /// Greeting request for a newly engaged person
    pub fn greeting(&self, person: Frame) -> Message {
        Message::vision(self.prompts.greeting.clone(), person)
    }

    /// System instruction for chat-with-motion completions
    pub fn motion_instruction(&self, motions: &[String]) -> String {
        self.prompts.render_motion_instruction(motions)
    }

    fn fill(&self, template: &str, text: &str) -> String {
        template.replace(TEXT_PLACEHOLDER, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_chat_core::Role;

    #[test]
    fn test_full_response_wraps_text() {
        let builder = PromptBuilder::default();
        let msg = builder.full_response("今日の天気は?");
        assert_eq!(msg.role, Role::User);
        assert!(msg.content.starts_with("今日の天気は?。"));
        assert!(msg.image.is_none());
    }

    #[test]
    fn test_short_response_lists_candidates() {
        let msg = PromptBuilder::default().short_response("こんにちは");
        assert!(msg.content.contains("「こんにちは」"));
        assert!(msg.content.contains("「なるほど。」"));
    }

    #[test]
    fn test_judge_appends_instruction() {
        let builder = PromptBuilder::default();
        let msg = builder.judge("これは何?");
        assert!(msg.content.starts_with(&builder.full_response("これは何?").content));
        assert!(msg.content.contains("\"vision\""));
    }

    #[test]
    fn test_vision_query_attaches_frame() {
        let frame = Frame::new(1, 1, vec![0u8; 4]);
        let msg = PromptBuilder::default().vision_query("これは何?", frame);
        assert_eq!(msg.role, Role::User);
        assert!(msg.image.is_some());
    }

    #[test]
    fn test_custom_templates() {
        let prompts = PromptsConfig {
            full_response: "Q: {text}".to_string(),
            ..Default::default()
        };
        let msg = PromptBuilder::new(prompts).full_response("hi");
        assert_eq!(msg.content, "Q: hi");
    }
}
