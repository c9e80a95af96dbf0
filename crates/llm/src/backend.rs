//! OpenAI-compatible streaming chat backend
//!
//! Sends the conversation to `/chat/completions` with `stream: true` and turns
//! the server-sent events into a [`ChatStream`]. Image-carrying messages are
//! encoded as content parts with a base64 data URL.
//!
//! Works with OpenAI, Azure OpenAI and local OpenAI-compatible servers.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use robot_chat_config::LlmSettings;
use robot_chat_core::{
    ChatMode, ChatModel, ChatRequest, ChatStream, Frame, Message, Role, StreamEvent,
};

use crate::motion_tag::MotionTagFilter;
use crate::LlmError;

/// Configuration for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API endpoint (OpenAI: https://api.openai.com/v1, Azure: custom)
    pub endpoint: String,
    pub api_key: String,
    /// Model used when a request does not name one
    pub model: String,
    pub max_tokens: u32,
    /// Temperature (0-2)
    pub temperature: f32,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Longest wait for response headers or the next streamed chunk
    pub idle_timeout: Duration,
    /// Organization ID (OpenAI specific)
    pub organization: Option<String>,
    /// Azure API version (Azure specific)
    pub api_version: Option<String>,
    /// System instruction added in chat-with-motion mode
    pub motion_instruction: Option<String>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4-turbo".to_string(),
            max_tokens: 256,
            temperature: 0.7,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(20),
            organization: None,
            api_version: None,
            motion_instruction: None,
        }
    }
}

impl OpenAIConfig {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            model: settings.chat_model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            idle_timeout: Duration::from_millis(settings.stream_idle_timeout_ms),
            ..Default::default()
        }
    }

    /// Create config for local OpenAI-compatible server (vLLM, Ollama, etc.)
    pub fn local(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: "not-needed".to_string(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_motion_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.motion_instruction = Some(instruction.into());
        self
    }

    fn is_local(&self) -> bool {
        ["http://localhost", "http://127.0.0.1"]
            .iter()
            .any(|prefix| self.endpoint.starts_with(prefix))
    }
}

/// OpenAI-compatible streaming backend
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !config.is_local() {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the full API URL for chat completions
    fn chat_url(&self, model: &str) -> String {
        if let Some(ref api_version) = self.config.api_version {
            // Azure format: {endpoint}/openai/deployments/{model}/chat/completions?api-version={version}
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.endpoint.trim_end_matches('/'),
                model,
                api_version
            )
        } else {
            format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
        }
    }

    fn build_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::HeaderValue;

        let mut headers = reqwest::header::HeaderMap::new();

        if self.config.api_version.is_some() {
            // Azure uses api-key header
            if let Ok(val) = HeaderValue::from_str(&self.config.api_key) {
                headers.insert("api-key", val);
            }
        } else {
            let auth_value = format!("Bearer {}", self.config.api_key);
            if let Ok(val) = HeaderValue::from_str(&auth_value) {
                headers.insert(reqwest::header::AUTHORIZATION, val);
            }
        }

        if let Some(ref org) = self.config.organization {
            if let Ok(val) = HeaderValue::from_str(org) {
                headers.insert("OpenAI-Organization", val);
            }
        }

        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        headers
    }

    fn build_request(&self, request: &ChatRequest) -> OpenAIChatRequest {
        let mut messages: Vec<OpenAIMessage> = request.messages.iter().map(OpenAIMessage::from).collect();

        if request.mode == ChatMode::ChatWithMotion {
            if let Some(ref instruction) = self.config.motion_instruction {
                // placed right before the utterance being answered
                let at = messages.len().saturating_sub(1);
                messages.insert(
                    at,
                    OpenAIMessage {
                        role: Role::System.to_string(),
                        content: OpenAIContent::Text(instruction.clone()),
                    },
                );
            }
        }

        OpenAIChatRequest {
            model: self.resolve_model(request).to_string(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: true,
        }
    }

    fn resolve_model<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.model
        } else {
            &request.model
        }
    }

    async fn open(&self, request: &ChatRequest) -> Result<reqwest::Response, LlmError> {
        let model = self.resolve_model(request);
        let body = self.build_request(request);

        tracing::debug!(
            model,
            messages = body.messages.len(),
            mode = ?request.mode,
            "Opening chat stream"
        );

        let send = self
            .client
            .post(self.chat_url(model))
            .headers(self.build_headers())
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.config.idle_timeout, send)
            .await
            .map_err(|_| LlmError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAIBackend {
    async fn stream_chat(&self, request: ChatRequest) -> robot_chat_core::Result<ChatStream> {
        let response = self.open(&request).await?;
        let idle = self.config.idle_timeout;
        let mut filter = (request.mode == ChatMode::ChatWithMotion).then(MotionTagFilter::new);

        let stream = async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut lines = SseLineBuffer::default();
            let mut done = false;

            while !done {
                let chunk = match tokio::time::timeout(idle, bytes.next()).await {
                    Err(_) => {
                        tracing::warn!(idle_ms = idle.as_millis() as u64, "Chat stream stalled");
                        yield Err(robot_chat_core::Error::from(LlmError::Timeout));
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        yield Err(robot_chat_core::Error::from(LlmError::from(e)));
                        return;
                    }
                    Ok(Some(Ok(chunk))) => chunk,
                };
                lines.push(&chunk);

                // Process complete SSE lines
                while let Some(line) = lines.next_line() {
                    match parse_sse_line(line.trim()) {
                        SseLine::Content(content) => {
                            let events = match filter.as_mut() {
                                Some(filter) => filter.push(&content),
                                None => vec![StreamEvent::Token(content)],
                            };
                            for event in events {
                                yield Ok(event);
                            }
                        }
                        SseLine::Done => {
                            done = true;
                            break;
                        }
                        SseLine::Skip => {}
                    }
                }
            }

            if let Some(filter) = filter.as_mut() {
                for event in filter.finish() {
                    yield Ok(event);
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }
}

/// Response bytes not yet split into lines.
///
/// Chunks may end inside a multi-byte character, so text is only decoded
/// once its line is complete.
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        loop {
            let end = self.pending.iter().position(|b| *b == b'\n')?;
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            match std::str::from_utf8(&line) {
                Ok(text) => return Some(text.to_string()),
                Err(e) => tracing::debug!(error = %e, "Skipping stream line that is not UTF-8"),
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Content(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(SseLine::Content)
            .unwrap_or(SseLine::Skip),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable stream chunk");
            SseLine::Skip
        }
    }
}

fn data_url(frame: &Frame) -> String {
    format!(
        "data:{};base64,{}",
        frame.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(frame.data())
    )
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: OpenAIContent,
}

impl From<&Message> for OpenAIMessage {
    fn from(msg: &Message) -> Self {
        let content = match msg.image {
            Some(ref frame) => OpenAIContent::Parts(vec![
                OpenAIContentPart::Text {
                    text: msg.content.clone(),
                },
                OpenAIContentPart::ImageUrl {
                    image_url: OpenAIImageUrl {
                        url: data_url(frame),
                    },
                },
            ]),
            None => OpenAIContent::Text(msg.content.clone()),
        };

        Self {
            role: msg.role.to_string(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

#[derive(Debug, Serialize)]
struct OpenAIImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: Option<OpenAIDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(config: OpenAIConfig) -> OpenAIBackend {
        OpenAIBackend::new(config).unwrap()
    }

    #[test]
    fn test_remote_endpoint_requires_key() {
        let result = OpenAIBackend::new(OpenAIConfig::default());
        assert!(matches!(result, Err(LlmError::Configuration(_))));

        assert!(OpenAIBackend::new(OpenAIConfig::local("http://localhost:8000/v1", "m")).is_ok());
    }

    #[test]
    fn test_chat_url() {
        let b = backend(OpenAIConfig::local("http://localhost:8000/v1/", "m"));
        assert_eq!(b.chat_url("m"), "http://localhost:8000/v1/chat/completions");

        let mut config = OpenAIConfig::local("http://localhost:8000", "m");
        config.api_version = Some("2024-02-01".to_string());
        let b = backend(config);
        assert_eq!(
            b.chat_url("gpt-4o"),
            "http://localhost:8000/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn test_line_buffer_keeps_split_characters() {
        let line = "data: こんにちは\n".as_bytes();
        // "こ" is three bytes starting at offset 6
        let (head, tail) = line.split_at(7);

        let mut lines = SseLineBuffer::default();
        lines.push(head);
        assert_eq!(lines.next_line(), None);
        lines.push(tail);
        assert_eq!(lines.next_line().as_deref(), Some("data: こんにちは\n"));
        assert_eq!(lines.next_line(), None);

        lines.push(b"\xff\xfe\ndata: [DONE]\n");
        assert_eq!(lines.next_line().as_deref(), Some("data: [DONE]\n"));
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"はい"}}]}"#),
            SseLine::Content("はい".to_string())
        );
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
    }

    #[test]
    fn test_vision_message_encoding() {
        let frame = Frame::new(2, 2, vec![0xFF, 0xD8, 0xFF, 0xE0]);
        let msg = OpenAIMessage::from(&Message::vision("これは何?", frame));
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "これは何?");
        assert_eq!(json["content"][1]["type"], "image_url");
        let url = json["content"][1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_text_message_encoding() {
        let json = serde_json::to_value(OpenAIMessage::from(&Message::system("sys"))).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "sys"}));
    }

    #[test]
    fn test_motion_instruction_inserted_before_utterance() {
        let b = backend(
            OpenAIConfig::local("http://localhost:8000", "m").with_motion_instruction("pick a motion"),
        );
        let request = ChatRequest::new(
            vec![Message::system("sys"), Message::user("こんにちは")],
            "",
        )
        .with_mode(ChatMode::ChatWithMotion);

        let body = b.build_request(&request);
        assert_eq!(body.model, "m");
        assert_eq!(body.messages.len(), 3);
        assert_eq!(body.messages[1].role, "system");
        assert_eq!(body.messages[2].role, "user");

        let plain = b.build_request(&request.clone().with_mode(ChatMode::Chat));
        assert_eq!(plain.messages.len(), 2);
    }
}
