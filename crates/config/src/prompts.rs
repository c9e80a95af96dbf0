//! Prompt templates
//!
//! Templates use `{text}` for the user's utterance and `{motions}` for the
//! list of selectable motion names.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const TEXT_PLACEHOLDER: &str = "{text}";
pub const MOTIONS_PLACEHOLDER: &str = "{motions}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// First message of every conversation
    #[serde(default = "default_system")]
    pub system: String,

    /// Wrapper for partial utterances; constrains the reply to a backchannel
    #[serde(default = "default_short_response")]
    pub short_response: String,

    /// Wrapper for complete utterances
    #[serde(default = "default_full_response")]
    pub full_response: String,

    /// Appended to the full-response message in selective mode
    #[serde(default = "default_judge_instruction")]
    pub judge_instruction: String,

    /// Sent with the cropped person image when someone approaches
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Added as a system message in chat-with-motion mode
    #[serde(default = "default_motion_instruction")]
    pub motion_instruction: String,
}

fn default_system() -> String {
    "チャットボットとしてロールプレイします。あかりという名前のカメラロボットとして振る舞ってください。"
        .to_string()
}

fn default_short_response() -> String {
    "「{text}」という文に対して、以下の「」内からどれか一つを選択して、それだけ回答してください。\n\
     「えーと。」「はい。」「うーん。」「いいえ。」「はい、そうですね。」「そうですね…。」\
     「いいえ、違います。」「こんにちは。」「ありがとうございます。」「なるほど。」「まあ。」"
        .to_string()
}

fn default_full_response() -> String {
    "{text}。回答は一文で短くまとめて答えてください。".to_string()
}

fn default_judge_instruction() -> String {
    "回答は次のJSON形式だけで出力してください。\n\
     {\"vision\": \"0\", \"motion\": \"動作名\", \"talk\": \"回答\"}\n\
     カメラ画像を見ないと答えられない質問の場合はvisionを\"1\"にしてください。\
     それ以外はvisionを\"0\"にしてtalkに回答を書いてください。"
        .to_string()
}

fn default_greeting() -> String {
    "画像の人の容姿や年齢、服装を見て挨拶の声がけをしてください。簡潔に答えてください。".to_string()
}

fn default_motion_instruction() -> String {
    "返答の先頭に[motion:動作名]の形式で、次の動作から一つ選んで付けてください: {motions}"
        .to_string()
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: default_system(),
            short_response: default_short_response(),
            full_response: default_full_response(),
            judge_instruction: default_judge_instruction(),
            greeting: default_greeting(),
            motion_instruction: default_motion_instruction(),
        }
    }
}

impl PromptsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, template) in [
            ("prompts.short_response", &self.short_response),
            ("prompts.full_response", &self.full_response),
        ] {
            if !template.contains(TEXT_PLACEHOLDER) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("template must contain {}", TEXT_PLACEHOLDER),
                });
            }
        }

        if self.system.trim().is_empty() {
            return Err(ConfigError::MissingField("prompts.system".to_string()));
        }

        Ok(())
    }

    /// Render the motion instruction for the given motion names
    pub fn render_motion_instruction(&self, motions: &[String]) -> String {
        self.motion_instruction
            .replace(MOTIONS_PLACEHOLDER, &motions.join(", "))
    }
}
