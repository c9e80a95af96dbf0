//! HTTP clients for the robot's speech and motion services

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use robot_chat_config::{MotionConfig, VoiceConfig};
use robot_chat_core::{Error, MotionCommand, MotionDispatcher, Result, SpeechDispatcher};

use crate::ServerError;

fn build_client(timeout: Duration) -> std::result::Result<reqwest::Client, ServerError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServerError::Config(format!("HTTP client: {}", e)))
}

async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &T,
) -> std::result::Result<(), reqwest::Error> {
    client
        .post(url)
        .json(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

#[derive(Serialize)]
struct TextBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct PlayFlagBody {
    flag: bool,
}

/// Speech service client (`/api/text`, `/api/play_flag`)
#[derive(Clone)]
pub struct HttpSpeechClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSpeechClient {
    pub fn new(config: &VoiceConfig) -> std::result::Result<Self, ServerError> {
        Ok(Self {
            client: build_client(Duration::from_millis(config.timeout_ms))?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SpeechDispatcher for HttpSpeechClient {
    async fn set_text(&self, sentence: &str) -> Result<()> {
        let url = format!("{}/api/text", self.endpoint);
        post_json(&self.client, &url, &TextBody { text: sentence })
            .await
            .map_err(|e| Error::Speech(e.to_string()))
    }

    async fn set_play_flag(&self, enabled: bool) -> Result<()> {
        let url = format!("{}/api/play_flag", self.endpoint);
        post_json(&self.client, &url, &PlayFlagBody { flag: enabled })
            .await
            .map_err(|e| Error::Speech(e.to_string()))
    }
}

/// Motion service client (`/api/motion`)
#[derive(Clone)]
pub struct HttpMotionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMotionClient {
    pub fn new(config: &MotionConfig) -> std::result::Result<Self, ServerError> {
        Ok(Self {
            client: build_client(Duration::from_millis(config.timeout_ms))?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MotionDispatcher for HttpMotionClient {
    async fn set_motion(&self, command: &MotionCommand) -> Result<()> {
        let url = format!("{}/api/motion", self.endpoint);
        post_json(&self.client, &url, command)
            .await
            .map_err(|e| Error::Motion(e.to_string()))
    }
}
