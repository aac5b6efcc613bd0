//! Scrub controller configuration (config.json).
//!
//! Every field is optional in the file; missing values fall back to the
//! defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Progress at which the scrub interaction counts as complete.
pub const DEFAULT_RELEASE_THRESHOLD: f64 = 0.98;
/// Grace period between release and restoring page scroll.
pub const DEFAULT_RELEASE_DELAY_MS: u64 = 200;
/// Pixel-equivalent input distance for one full traversal of the video.
pub const DEFAULT_SCROLL_DISTANCE: f64 = 2_000.0;
/// Touch gestures cover less physical range than a wheel.
pub const DEFAULT_TOUCH_MULTIPLIER: f64 = 3.0;
/// Fixed delta injected by one arrow key press.
pub const DEFAULT_KEY_STEP: f64 = 50.0;
/// Duration assumed until the media reports its own.
pub const DEFAULT_PLACEHOLDER_DURATION_S: f64 = 30.0;
pub const DEFAULT_HANDSHAKE_DELAY_MS: u64 = 1_500;
pub const DEFAULT_TRUSTED_ORIGIN: &str = "https://streamable.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrubConfig {
    /// Multiplier applied to all deltas.
    pub playback_speed: f64,
    /// Multiplier applied to wheel, touch and key deltas alike.
    pub scroll_sensitivity: f64,
    /// Minimum |delta| to process.
    pub min_scroll_delta: f64,
    /// Apply cubic ease-out to progress before mapping it to time.
    pub enable_easing: bool,
    /// Accumulated scroll that spans the whole video.
    pub scroll_distance: f64,
    /// Progress at which the lock releases.
    pub release_threshold: f64,
    /// Delay between release and restoring page scroll.
    pub release_delay_ms: u64,
    /// Scale applied to raw touch deltas.
    pub touch_multiplier: f64,
    /// Delta injected per arrow key press.
    pub key_step: f64,
    /// Duration (seconds) assumed until a real one is known.
    pub placeholder_duration: f64,
    /// Wait before the first pause/seek/duration request to the player.
    pub handshake_delay_ms: u64,
    /// Only notices from this origin may set the duration; also the target
    /// origin of outbound player messages.
    pub trusted_origin: String,
    /// Send the redundant `seek` message after every `setCurrentTime`.
    pub mirror_seek: bool,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            playback_speed: 1.0,
            scroll_sensitivity: 1.2,
            min_scroll_delta: 1.0,
            enable_easing: true,
            scroll_distance: DEFAULT_SCROLL_DISTANCE,
            release_threshold: DEFAULT_RELEASE_THRESHOLD,
            release_delay_ms: DEFAULT_RELEASE_DELAY_MS,
            touch_multiplier: DEFAULT_TOUCH_MULTIPLIER,
            key_step: DEFAULT_KEY_STEP,
            placeholder_duration: DEFAULT_PLACEHOLDER_DURATION_S,
            handshake_delay_ms: DEFAULT_HANDSHAKE_DELAY_MS,
            trusted_origin: DEFAULT_TRUSTED_ORIGIN.to_string(),
            mirror_seek: true,
        }
    }
}

impl ScrubConfig {
    /// Reads and validates a config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: ScrubConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("playbackSpeed", self.playback_speed)?;
        positive("scrollSensitivity", self.scroll_sensitivity)?;
        positive("scrollDistance", self.scroll_distance)?;
        positive("touchMultiplier", self.touch_multiplier)?;
        positive("keyStep", self.key_step)?;
        positive("placeholderDuration", self.placeholder_duration)?;

        if !self.min_scroll_delta.is_finite() || self.min_scroll_delta < 0.0 {
            return Err(ConfigError::Invalid {
                field: "minScrollDelta",
                reason: format!("expected a finite value >= 0, got {}", self.min_scroll_delta),
            });
        }

        if !(self.release_threshold > 0.0 && self.release_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "releaseThreshold",
                reason: format!("expected a value in (0, 1], got {}", self.release_threshold),
            });
        }

        if self.trusted_origin.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "trustedOrigin",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("expected a finite value > 0, got {value}"),
        })
    }
}
