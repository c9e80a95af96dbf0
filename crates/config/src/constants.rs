//! Default values shared by the settings sections
//!
//! Ports match the robot's service layout: this server listens on 10001 and
//! the speech service on 10002.

/// Network endpoints
pub mod endpoints {
    pub const SERVER_HOST: &str = "127.0.0.1";
    pub const SERVER_PORT: u16 = 10001;
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";
    pub const VOICE_DEFAULT: &str = "http://localhost:10002";
    pub const MOTION_DEFAULT: &str = "http://localhost:10003";
}

/// Model identifiers
pub mod models {
    pub const CHAT: &str = "gpt-4-turbo";
    pub const JUDGE: &str = "gpt-4-turbo";
    pub const VISION: &str = "gpt-4o";
}

/// Timeouts in milliseconds
pub mod timeouts {
    pub const LLM_CONNECT_MS: u64 = 10_000;
    /// Longest silence tolerated between two streamed chunks
    pub const LLM_STREAM_IDLE_MS: u64 = 20_000;
    pub const VOICE_MS: u64 = 5_000;
    pub const MOTION_MS: u64 = 2_000;
}

/// Engagement tracking
pub mod engagement {
    /// A tracked person closer than this (mm) gets greeted
    pub const GREETING_DISTANCE_MM: f32 = 2500.0;
    pub const FRAME_QUEUE: usize = 4;
}

/// Turn dispatch
pub mod dispatch {
    /// Utterances shorter than this (in characters) are treated as noise
    pub const MIN_TEXT_CHARS: usize = 2;
    pub const LOOKUP_MOTION: &str = "lookup";
    pub const LOOKUP_PRIORITY: u8 = 3;
}
