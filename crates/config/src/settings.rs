//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{dispatch, endpoints, engagement, models, timeouts};
use crate::{ConfigError, PromptsConfig};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Language model backend
    #[serde(default)]
    pub llm: LlmSettings,

    /// Speech synthesis service
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Robot motion service
    #[serde(default)]
    pub motion: MotionConfig,

    /// Interlocutor selection
    #[serde(default)]
    pub engagement: EngagementConfig,

    /// Turn handling
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    endpoints::SERVER_HOST.to_string()
}

fn default_port() -> u16 {
    endpoints::SERVER_PORT
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
        }
    }
}

/// OpenAI-compatible backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Falls back to `OPENAI_API_KEY`
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    /// Model for partial and non-selective final turns
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model for image-attached requests (greeting, vision escalation)
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Model asked for the structured vision decision
    #[serde(default = "default_judge_model")]
    pub judge_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Longest wait for the next streamed chunk
    #[serde(default = "default_stream_idle_timeout_ms")]
    pub stream_idle_timeout_ms: u64,
}

fn default_llm_endpoint() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| endpoints::OPENAI_DEFAULT.to_string())
}

fn default_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok()
}

fn default_chat_model() -> String {
    models::CHAT.to_string()
}

fn default_vision_model() -> String {
    models::VISION.to_string()
}

fn default_judge_model() -> String {
    models::JUDGE.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    256
}

fn default_connect_timeout_ms() -> u64 {
    timeouts::LLM_CONNECT_MS
}

fn default_stream_idle_timeout_ms() -> u64 {
    timeouts::LLM_STREAM_IDLE_MS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: default_api_key(),
            chat_model: default_chat_model(),
            vision_model: default_vision_model(),
            judge_model: default_judge_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            connect_timeout_ms: default_connect_timeout_ms(),
            stream_idle_timeout_ms: default_stream_idle_timeout_ms(),
        }
    }
}

/// Speech service client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_voice_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_voice_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_voice_endpoint() -> String {
    endpoints::VOICE_DEFAULT.to_string()
}

fn default_voice_timeout_ms() -> u64 {
    timeouts::VOICE_MS
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_voice_endpoint(),
            timeout_ms: default_voice_timeout_ms(),
        }
    }
}

/// A named motion with its playback parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSpec {
    pub name: String,

    #[serde(default)]
    pub priority: u8,

    #[serde(default)]
    pub repeat: bool,

    #[serde(default)]
    pub clear: bool,
}

/// Motion service client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_motion_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_motion_timeout_ms")]
    pub timeout_ms: u64,

    /// Played when a turn escalates to the camera
    #[serde(default = "default_lookup_motion")]
    pub lookup_motion: MotionSpec,

    /// Names the model may pick from in chat-with-motion mode
    #[serde(default = "default_available_motions")]
    pub available_motions: Vec<String>,
}

fn default_motion_endpoint() -> String {
    endpoints::MOTION_DEFAULT.to_string()
}

fn default_motion_timeout_ms() -> u64 {
    timeouts::MOTION_MS
}

fn default_lookup_motion() -> MotionSpec {
    MotionSpec {
        name: dispatch::LOOKUP_MOTION.to_string(),
        priority: dispatch::LOOKUP_PRIORITY,
        repeat: false,
        clear: true,
    }
}

fn default_available_motions() -> Vec<String> {
    ["nod", "tilt", "swing", "wave", "bow"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_motion_endpoint(),
            timeout_ms: default_motion_timeout_ms(),
            lookup_motion: default_lookup_motion(),
            available_motions: default_available_motions(),
        }
    }
}

/// Interlocutor selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Tracked detections at or under this distance (mm) can be engaged
    #[serde(default = "default_greeting_distance_mm")]
    pub greeting_distance_mm: f32,

    /// Only detections with this label are candidates; `None` accepts all
    #[serde(default)]
    pub target_label: Option<String>,

    #[serde(default = "default_true")]
    pub greeting_enabled: bool,

    /// Pending tracker frames before new ones are dropped
    #[serde(default = "default_frame_queue")]
    pub frame_queue: usize,
}

fn default_greeting_distance_mm() -> f32 {
    engagement::GREETING_DISTANCE_MM
}

fn default_frame_queue() -> usize {
    engagement::FRAME_QUEUE
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            greeting_distance_mm: default_greeting_distance_mm(),
            target_label: None,
            greeting_enabled: true,
            frame_queue: default_frame_queue(),
        }
    }
}

/// How final turns are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Judge each final turn for vision escalation
    #[default]
    Selective,
    /// Stream every turn straight to speech
    NonSelective,
}

/// Turn dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub mode: DispatchMode,

    /// Shorter utterances are ignored as noise
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Spoken while the vision re-query is opened
    #[serde(default = "default_filler_text")]
    pub filler_text: String,

    /// Append a summary of visible detections to final utterances
    #[serde(default)]
    pub attach_scene_summary: bool,
}

fn default_min_text_chars() -> usize {
    dispatch::MIN_TEXT_CHARS
}

fn default_filler_text() -> String {
    "ちょっと見てみますね。".to_string()
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            min_text_chars: default_min_text_chars(),
            filler_text: default_filler_text(),
            attach_scene_summary: false,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_llm()?;
        self.validate_engagement()?;
        self.validate_dispatcher()?;
        self.validate_downstream()?;
        self.prompts.validate()?;
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        for (field, model) in [
            ("llm.chat_model", &self.llm.chat_model),
            ("llm.vision_model", &self.llm.vision_model),
            ("llm.judge_model", &self.llm.judge_model),
        ] {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Model id must not be empty".to_string(),
                });
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }

        if self.llm.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.connect_timeout_ms".to_string(),
                message: "Timeout must be positive".to_string(),
            });
        }

        if self.llm.stream_idle_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.stream_idle_timeout_ms".to_string(),
                message: "Timeout must be positive".to_string(),
            });
        }

        Ok(())
    }

    fn validate_engagement(&self) -> Result<(), ConfigError> {
        let distance = self.engagement.greeting_distance_mm;
        if !distance.is_finite() || distance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "engagement.greeting_distance_mm".to_string(),
                message: format!("Must be a positive distance, got {}", distance),
            });
        }

        if self.engagement.frame_queue == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engagement.frame_queue".to_string(),
                message: "Queue size must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_dispatcher(&self) -> Result<(), ConfigError> {
        if self.dispatcher.min_text_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dispatcher.min_text_chars".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_downstream(&self) -> Result<(), ConfigError> {
        if self.voice.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "voice.timeout_ms".to_string(),
                message: "Timeout must be positive".to_string(),
            });
        }

        if self.motion.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "motion.timeout_ms".to_string(),
                message: "Timeout must be positive".to_string(),
            });
        }

        if self.motion.lookup_motion.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "motion.lookup_motion.name".to_string(),
                message: "Lookup motion name must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from `config/` relative to the working directory
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from a configuration directory
///
/// Sources, later ones overriding earlier ones:
/// `{dir}/default.yaml`, `{dir}/{env}.yaml`, `ROBOT_CHAT__*` variables.
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::from(dir.join("default")).required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("ROBOT_CHAT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        mode = ?settings.dispatcher.mode,
        chat_model = %settings.llm.chat_model,
        "Settings loaded"
    );

    Ok(settings)
}
