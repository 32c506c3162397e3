//! Application configuration.
//!
//! Settings come from environment variables (with `.env` support for local
//! development) and are validated once at startup.

use std::env;
use tracing::Level;

/// Upper bound on slide pages taken from a deck; later pages are ignored.
pub const MAX_SLIDE_PAGES: usize = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub critique_model: String,
    pub counter_model: String,
    pub tts_model: String,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY`: Secret key for the generative API. Required.
    // *   `CRITIQUE_MODEL`: (Optional) Model for the structured critique pass.
    // *   `COUNTER_MODEL`: (Optional) Model for counter-critique replies.
    // *   `TTS_MODEL`: (Optional) Model for professor voice synthesis.
    // *   `RUST_LOG`: (Optional) Logging level, defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Ignored if not present.
        dotenvy::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let critique_model =
            env::var("CRITIQUE_MODEL").unwrap_or_else(|_| "gemini-3-pro-preview".to_string());
        let counter_model =
            env::var("COUNTER_MODEL").unwrap_or_else(|_| "gemini-3-flash-preview".to_string());
        let tts_model =
            env::var("TTS_MODEL").unwrap_or_else(|_| "gemini-2.5-flash-preview-tts".to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key,
            critique_model,
            counter_model,
            tts_model,
            log_level,
        })
    }
}
