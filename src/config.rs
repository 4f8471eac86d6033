use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::engine::EngineSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32, // En porcentaje, como lo escribe el usuario
    pub loudness_target_db: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Tiempos
    pub idle_timeout: Duration,
    pub now_playing_refresh: Duration,
    pub resolve_timeout: Duration,

    // APIs (Opcionales)
    pub youtube_api_key: Option<String>,
    pub soundcloud_client_id: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no configurado")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no configurado")?
                .parse::<u64>()
                .context("APPLICATION_ID debe ser numérico")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            loudness_target_db: std::env::var("LOUDNESS_TARGET_DB")
                .unwrap_or_else(|_| "-14.0".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "25".to_string())
                .parse()?,

            // Tiempos
            idle_timeout: Duration::from_secs(
                std::env::var("IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            ),
            now_playing_refresh: Duration::from_secs(
                std::env::var("NOW_PLAYING_REFRESH_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
            ),
            resolve_timeout: Duration::from_secs(
                std::env::var("RESOLVE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            ),

            // APIs
            youtube_api_key: std::env::var("YOUTUBE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            soundcloud_client_id: std::env::var("SOUNDCLOUD_CLIENT_ID")
                .ok()
                .filter(|id| !id.trim().is_empty()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must be between 10 and 200 (percent)
    /// - Queue and playlist limits must be greater than zero
    /// - The live refresh interval and resolve timeout must be non-zero
    ///
    /// # Returns
    ///
    /// - `Ok(())`: All values are valid
    /// - `Err(anyhow::Error)`: Invalid configuration detected
    pub fn validate(&self) -> Result<()> {
        if !(10.0..=200.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 10 and 200, got: {}",
                self.default_volume
            );
        }

        if !self.loudness_target_db.is_finite() {
            anyhow::bail!("Loudness target must be a finite dB value");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.now_playing_refresh.is_zero() {
            anyhow::bail!("Now playing refresh interval must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    /// Engine tuning derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            idle_timeout: self.idle_timeout,
            refresh_interval: self.now_playing_refresh,
            loudness_target_db: self.loudness_target_db,
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes sensitive information like tokens and API keys.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, target {} dB\n  \
            Limits: {} queue, {} playlist items\n  \
            Timers: idle {}, refresh {}, resolve {}\n  \
            APIs: YouTube search={}, SoundCloud={}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.default_volume,
            self.loudness_target_db,
            self.max_queue_size,
            self.max_playlist_size,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.now_playing_refresh),
            humantime::format_duration(self.resolve_timeout),
            self.youtube_api_key.is_some(),
            self.soundcloud_client_id.is_some(),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio defaults
            default_volume: 100.0,
            loudness_target_db: -14.0,
            max_queue_size: 1000,
            max_playlist_size: 25,

            // Timer defaults
            idle_timeout: Duration::from_secs(300),
            now_playing_refresh: Duration::from_secs(5),
            resolve_timeout: Duration::from_secs(30),

            youtube_api_key: None,
            soundcloud_client_id: None,
        }
    }
}
