//! Host input events and the replay script schema (script.json).
//! schemaVersion: 1

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Where a scrub delta came from. Scaling differs per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Wheel,
    Touch,
    Key,
}

/// Keys the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubKey {
    ArrowDown,
    ArrowUp,
    Escape,
    Other,
}

impl ScrubKey {
    /// Maps a DOM-style `KeyboardEvent.key` value.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ArrowDown" => ScrubKey::ArrowDown,
            "ArrowUp" => ScrubKey::ArrowUp,
            "Escape" | "Esc" => ScrubKey::Escape,
            _ => ScrubKey::Other,
        }
    }
}

/// One event delivered by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScrubEvent {
    /// Wheel scroll; positive `deltaY` scrolls forward.
    Wheel {
        /// Milliseconds since mount.
        ts: u64,
        #[serde(rename = "deltaY", alias = "delta_y")]
        delta_y: f64,
    },
    TouchStart {
        ts: u64,
        y: f64,
    },
    TouchMove {
        ts: u64,
        y: f64,
    },
    KeyDown {
        ts: u64,
        #[serde(rename = "keyCode", alias = "key_code")]
        key_code: String,
    },
    /// Cross-frame message received from an embedded player.
    Message {
        ts: u64,
        origin: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Native media element finished loading metadata.
    MetadataLoaded {
        ts: u64,
        #[serde(default)]
        duration: Option<f64>,
    },
    Reset {
        ts: u64,
    },
}

impl ScrubEvent {
    pub fn ts(&self) -> u64 {
        match self {
            ScrubEvent::Wheel { ts, .. } => *ts,
            ScrubEvent::TouchStart { ts, .. } => *ts,
            ScrubEvent::TouchMove { ts, .. } => *ts,
            ScrubEvent::KeyDown { ts, .. } => *ts,
            ScrubEvent::Message { ts, .. } => *ts,
            ScrubEvent::MetadataLoaded { ts, .. } => *ts,
            ScrubEvent::Reset { ts } => *ts,
        }
    }
}

/// Root container of a replay script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptFile {
    pub schema_version: u32,
    #[serde(default)]
    pub events: Vec<ScrubEvent>,
}
